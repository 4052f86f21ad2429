//! Chunk ingestor — one datagram in, at most one frame out.
//!
//! Validates the fixed header, routes the payload into the reassembly
//! table, and hands completed buffers to the finalizer. Malformed input is
//! returned as a `WireError` and counted; nothing here is fatal.

use std::time::Instant;

use bytes::Bytes;

use rxstream_core::config::ReassemblyConfig;
use rxstream_core::wire::{ChunkHeader, WireError, CHUNK_HEADER_LEN, TYPE_TAG_LEN};

use crate::finalize::{Frame, FrameFinalizer};
use crate::stats::ReceiveStats;
use crate::table::{DropReason, InsertOutcome, ReassemblyTable};

/// What became of an accepted datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// Stored; the frame is still missing chunks.
    Pending,
    /// Same chunk seen before. Ignored.
    Duplicate,
    /// Straggler of a recently dropped frame. Ignored.
    Late,
    /// The chunk pushed its frame over the byte ceiling; the frame is gone.
    Dropped(DropReason),
    /// The chunk completed its frame.
    Frame(Frame),
}

pub struct ChunkIngestor {
    max_chunks: u16,
    max_datagram_bytes: usize,
    table: ReassemblyTable,
    finalizer: FrameFinalizer,
    stats: ReceiveStats,
}

impl ChunkIngestor {
    pub fn new(limits: &ReassemblyConfig) -> Self {
        Self {
            max_chunks: limits.max_chunks,
            max_datagram_bytes: limits.max_datagram_bytes,
            table: ReassemblyTable::new(limits),
            finalizer: FrameFinalizer::new(),
            stats: ReceiveStats::default(),
        }
    }

    /// Process one datagram received at `now`.
    pub fn ingest(&mut self, datagram: Bytes, now: Instant) -> Result<Ingested, WireError> {
        self.stats.datagrams += 1;
        let result = self.ingest_inner(datagram, now);
        if let Err(e) = &result {
            self.stats.record_malformed(e);
            tracing::debug!(error = %e, "malformed chunk, discarding");
        }
        self.drain_evicted();
        result
    }

    fn ingest_inner(&mut self, datagram: Bytes, now: Instant) -> Result<Ingested, WireError> {
        if datagram.len() > self.max_datagram_bytes {
            return Err(WireError::TooLong {
                len: datagram.len(),
                max: self.max_datagram_bytes,
            });
        }
        let header = ChunkHeader::parse(&datagram, self.max_chunks)?;
        let frame_id = header.frame_id();
        let chunk_index = header.chunk_index();
        let payload = datagram.slice(CHUNK_HEADER_LEN..);
        let payload_len = payload.len();

        let outcome = self.table.insert(
            frame_id,
            chunk_index,
            header.total_chunks(),
            payload,
            now,
        )?;

        let ingested = match outcome {
            InsertOutcome::Incomplete { received, total } => {
                self.stats.chunks_accepted += 1;
                tracing::trace!(frame_id, chunk_index, received, total, payload_len, "chunk stored");
                Ingested::Pending
            }
            InsertOutcome::Duplicate => {
                self.stats.duplicates += 1;
                tracing::debug!(frame_id, chunk_index, "duplicate chunk, ignoring");
                Ingested::Duplicate
            }
            InsertOutcome::Late => {
                self.stats.late_chunks += 1;
                tracing::debug!(frame_id, chunk_index, "chunk for dropped frame, ignoring");
                Ingested::Late
            }
            InsertOutcome::Dropped(reason) => {
                self.stats.dropped_oversized += 1;
                tracing::warn!(frame_id, chunk_index, %reason, "frame dropped");
                Ingested::Dropped(reason)
            }
            InsertOutcome::Complete(whole) => {
                self.stats.chunks_accepted += 1;
                self.stats.frames_completed += 1;
                let frame = self.finalizer.finalize(frame_id, whole);
                if frame.data.len() <= TYPE_TAG_LEN {
                    self.stats.frames_unverified += 1;
                } else if !frame.crc_ok {
                    self.stats.crc_failures += 1;
                }
                Ingested::Frame(frame)
            }
        };
        Ok(ingested)
    }

    /// Evict idle frames. Returns how many were evicted.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let evicted = self.table.sweep(now);
        self.drain_evicted();
        evicted
    }

    fn drain_evicted(&mut self) {
        for evicted in self.table.take_evicted() {
            self.stats.record_evicted(&evicted);
            tracing::warn!(
                frame_id = evicted.frame_id,
                received = evicted.received,
                total = evicted.total,
                reason = %evicted.reason,
                "incomplete frame discarded"
            );
        }
    }

    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    pub fn table(&self) -> &ReassemblyTable {
        &self.table
    }
}
