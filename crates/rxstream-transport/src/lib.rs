//! rxstream-transport — reassembles sensor frames from chunked datagrams.
//!
//! Datagrams flow through the `ChunkIngestor` (header validation), into the
//! `ReassemblyTable` (per-frame slots), and out through the
//! `FrameFinalizer` (type tag + CRC-32). `FrameReceiver` ties the three to a
//! `DatagramSource` and hands out one `Frame` per call.

pub mod finalize;
pub mod ingest;
pub mod receiver;
pub mod source;
pub mod stats;
pub mod table;

pub use finalize::{Frame, FrameFinalizer};
pub use ingest::{ChunkIngestor, Ingested};
pub use receiver::{FrameReceiver, ReceiveError};
pub use source::{Datagram, DatagramSource, UdpSource};
pub use stats::{MalformedStats, ReceiveStats};
pub use table::{DropReason, EvictReason, Evicted, InsertOutcome, ReassemblyTable};
