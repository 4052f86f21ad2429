//! Turns a reassembled buffer into a `Frame`.
//!
//! ```text
//! [type_tag: u32 LE][sensor header + payload ...][crc32: u32 LE]
//! ```
//!
//! The CRC covers everything before it, type tag included. A mismatch is
//! reported on the frame, never turned into an error: the consumer decides
//! whether a corrupt depth map is still worth drawing.

use bytes::Bytes;

use rxstream_core::wire::{SensorKind, CHECKSUM_LEN, TYPE_TAG_LEN};
use rxstream_core::Crc32;

/// One fully reassembled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender's frame counter.
    pub frame_id: u32,
    /// First four bytes as a little-endian `u32`. Zero if the frame is shorter.
    pub type_tag: u32,
    /// The whole reassembled buffer, tag and checksum included.
    pub data: Bytes,
    /// Trailing CRC-32 matched. Always false for frames of four bytes or fewer.
    pub crc_ok: bool,
    /// False only on the placeholder returned after a transport failure.
    pub valid: bool,
}

impl Frame {
    /// Placeholder for "no frame": the transport failed while waiting.
    pub fn invalid() -> Self {
        Self {
            frame_id: 0,
            type_tag: 0,
            data: Bytes::new(),
            crc_ok: false,
            valid: false,
        }
    }

    pub fn sensor(&self) -> SensorKind {
        SensorKind::from_tag(self.type_tag)
    }

    /// Checksum carried in the last four bytes, if the frame is long enough
    /// to hold one.
    pub fn declared_crc(&self) -> Option<u32> {
        if self.data.len() <= TYPE_TAG_LEN {
            return None;
        }
        let tail = &self.data[self.data.len() - CHECKSUM_LEN..];
        Some(u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]))
    }

    /// Bytes between the type tag and the checksum: the sensor's own header
    /// and payload. Empty when the frame has no room for both.
    pub fn body(&self) -> &[u8] {
        if self.data.len() < TYPE_TAG_LEN + CHECKSUM_LEN {
            return &[];
        }
        &self.data[TYPE_TAG_LEN..self.data.len() - CHECKSUM_LEN]
    }
}

/// Extracts the type tag and verifies the trailing checksum.
#[derive(Debug, Clone, Default)]
pub struct FrameFinalizer {
    crc: Crc32,
}

impl FrameFinalizer {
    pub fn new() -> Self {
        Self { crc: Crc32::new() }
    }

    pub fn finalize(&self, frame_id: u32, whole: Vec<u8>) -> Frame {
        let type_tag = match whole.get(..TYPE_TAG_LEN) {
            Some(tag) => u32::from_le_bytes([tag[0], tag[1], tag[2], tag[3]]),
            None => 0,
        };

        // Frames of four bytes or fewer cannot carry both a tag and a
        // checksum. They pass through unverified.
        let crc_ok = if whole.len() > TYPE_TAG_LEN {
            let (covered, tail) = whole.split_at(whole.len() - CHECKSUM_LEN);
            let declared = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
            let computed = self.crc.checksum(covered);
            if computed != declared {
                tracing::warn!(
                    frame_id,
                    sensor = %SensorKind::from_tag(type_tag),
                    declared = %format!("{declared:08x}"),
                    computed = %format!("{computed:08x}"),
                    len = whole.len(),
                    "frame checksum mismatch"
                );
            }
            computed == declared
        } else {
            tracing::debug!(frame_id, len = whole.len(), "frame too short to verify");
            false
        };

        Frame {
            frame_id,
            type_tag,
            data: Bytes::from(whole),
            crc_ok,
            valid: true,
        }
    }
}
