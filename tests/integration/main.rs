//! RXStream integration test harness.
//!
//! Tests in this crate drive a `FrameReceiver` over real loopback UDP
//! sockets, playing the capture device's part: frames are sealed with a
//! CRC-32, split into chunks and sent as individual datagrams.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use zerocopy::AsBytes;

use rxstream_core::config::ReassemblyConfig;
use rxstream_core::wire::ChunkHeader;
use rxstream_core::Crc32;
use rxstream_transport::{Frame, FrameReceiver, UdpSource};

mod fault;
mod udp;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Chunk payload size the capture app uses by default.
pub const DEVICE_CHUNK: usize = 1400;

/// How long a test waits for a frame before failing.
pub const FRAME_WAIT: Duration = Duration::from_secs(5);

/// Append the little-endian CRC-32 of `[tag][body]`, producing a frame as the
/// device emits it.
pub fn seal(tag: u32, body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_le_bytes().to_vec();
    out.extend_from_slice(body);
    let crc = Crc32::new().checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Split a frame into datagrams of at most `max_payload` payload bytes each.
pub fn make_chunks(frame_id: u32, frame: &[u8], max_payload: usize) -> Vec<Vec<u8>> {
    let pieces: Vec<&[u8]> = frame.chunks(max_payload).collect();
    let total = pieces.len() as u16;
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut datagram = ChunkHeader::new(frame_id, i as u16, total)
                .as_bytes()
                .to_vec();
            datagram.extend_from_slice(piece);
            datagram
        })
        .collect()
}

/// Deterministic body bytes of a given length.
pub fn body(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// A receiver bound to 127.0.0.1 and a sender socket aimed at it.
pub struct Loopback {
    pub receiver: FrameReceiver<UdpSource>,
    pub sender: UdpSocket,
    pub addr: SocketAddr,
}

impl Loopback {
    pub async fn new(limits: ReassemblyConfig) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .context("failed to bind receiver")?;
        let addr = socket.local_addr()?;
        let receiver = FrameReceiver::new(UdpSource::new(Arc::new(socket)), &limits);

        let sender = UdpSocket::bind("127.0.0.1:0")
            .await
            .context("failed to bind sender")?;
        Ok(Self {
            receiver,
            sender,
            addr,
        })
    }

    pub async fn send(&self, datagram: &[u8]) -> Result<()> {
        self.sender
            .send_to(datagram, self.addr)
            .await
            .context("send_to failed")?;
        Ok(())
    }

    pub async fn send_all<I, D>(&self, datagrams: I) -> Result<()>
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        for datagram in datagrams {
            self.send(datagram.as_ref()).await?;
        }
        Ok(())
    }

    /// Next frame, or an error if none completes within `FRAME_WAIT`.
    pub async fn next_frame(&mut self) -> Result<Frame> {
        let frame = tokio::time::timeout(FRAME_WAIT, self.receiver.try_recv_frame())
            .await
            .context("timed out waiting for frame")??;
        Ok(frame)
    }

    /// True if no frame completes within `wait`.
    pub async fn stays_quiet(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.receiver.try_recv_frame())
            .await
            .is_err()
    }
}
