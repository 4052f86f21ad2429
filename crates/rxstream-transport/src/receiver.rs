//! Frame receiver — the blocking "get next frame" surface.
//!
//! Owns the reassembly state outright. Each call waits until one frame
//! completes or the datagram source fails; idle frames are swept on a timer
//! while it waits, so a silent sender still releases memory.

use std::time::Duration;

use rxstream_core::config::ReassemblyConfig;

use crate::finalize::Frame;
use crate::ingest::{ChunkIngestor, Ingested};
use crate::source::DatagramSource;
use crate::stats::ReceiveStats;
use crate::table::ReassemblyTable;

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("datagram receive failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("datagram source closed")]
    Closed,
}

pub struct FrameReceiver<S> {
    source: S,
    ingestor: ChunkIngestor,
    sweep_interval: Duration,
}

impl<S: DatagramSource> FrameReceiver<S> {
    pub fn new(source: S, limits: &ReassemblyConfig) -> Self {
        Self {
            source,
            ingestor: ChunkIngestor::new(limits),
            sweep_interval: limits.sweep_interval().max(Duration::from_millis(1)),
        }
    }

    /// Wait for the next complete frame.
    ///
    /// Malformed, duplicate, late and oversized input is absorbed; only a
    /// failing source ends the wait early. Wrap in `tokio::time::timeout`
    /// for a bounded wait.
    ///
    /// Cancel safe: a datagram is either still in the source or fully
    /// ingested when the future is dropped.
    pub async fn try_recv_frame(&mut self) -> Result<Frame, ReceiveError> {
        let start = tokio::time::Instant::now() + self.sweep_interval;
        let mut sweep = tokio::time::interval_at(start, self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.source.recv_datagram() => {
                    let datagram = received?;
                    let now = tokio::time::Instant::now().into_std();
                    match self.ingestor.ingest(datagram.payload, now) {
                        Ok(Ingested::Frame(frame)) => return Ok(frame),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::trace!(error = %e, from = %datagram.from, "datagram rejected");
                        }
                    }
                }
                _ = sweep.tick() => {
                    self.ingestor.sweep(tokio::time::Instant::now().into_std());
                }
            }
        }
    }

    /// Like `try_recv_frame`, but a transport failure yields `Frame::invalid()`.
    pub async fn recv_frame(&mut self) -> Frame {
        match self.try_recv_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame receive failed");
                Frame::invalid()
            }
        }
    }

    pub fn stats(&self) -> &ReceiveStats {
        self.ingestor.stats()
    }

    pub fn table(&self) -> &ReassemblyTable {
        self.ingestor.table()
    }
}
