//! Receive statistics.

use serde::Serialize;

use rxstream_core::wire::WireError;

use crate::table::{EvictReason, Evicted};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveStats {
    pub datagrams: u64,
    pub chunks_accepted: u64,
    pub duplicates: u64,
    /// Stragglers of recently dropped frames.
    pub late_chunks: u64,
    pub malformed: MalformedStats,
    pub frames_completed: u64,
    pub crc_failures: u64,
    /// Frames too short to carry a checksum.
    pub frames_unverified: u64,
    pub dropped_oversized: u64,
    pub expired: u64,
    pub evicted: u64,
}

/// Rejected datagrams, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MalformedStats {
    pub too_short: u64,
    pub too_long: u64,
    pub bad_magic: u64,
    pub bad_version: u64,
    pub bad_total: u64,
    pub bad_index: u64,
    pub total_mismatch: u64,
}

impl MalformedStats {
    pub fn total(&self) -> u64 {
        self.too_short
            + self.too_long
            + self.bad_magic
            + self.bad_version
            + self.bad_total
            + self.bad_index
            + self.total_mismatch
    }
}

impl ReceiveStats {
    pub fn record_malformed(&mut self, err: &WireError) {
        let counter = match err {
            WireError::TooShort(_) => &mut self.malformed.too_short,
            WireError::TooLong { .. } => &mut self.malformed.too_long,
            WireError::BadMagic(_) => &mut self.malformed.bad_magic,
            WireError::UnknownVersion(_) => &mut self.malformed.bad_version,
            WireError::InvalidTotalChunks { .. } => &mut self.malformed.bad_total,
            WireError::ChunkIndexOutOfRange { .. } => &mut self.malformed.bad_index,
            WireError::TotalChunksMismatch { .. } => &mut self.malformed.total_mismatch,
        };
        *counter += 1;
    }

    pub fn record_evicted(&mut self, evicted: &Evicted) {
        match evicted.reason {
            EvictReason::Expired { .. } => self.expired += 1,
            EvictReason::Capacity => self.evicted += 1,
        }
    }
}
