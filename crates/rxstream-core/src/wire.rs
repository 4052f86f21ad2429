//! RXStream wire format — the per-datagram chunk header and frame layout.
//!
//! These types ARE the protocol. Every field and every size is shared with
//! the capture device that splits frames into datagrams; changing anything
//! here is a breaking change for every sender in the field.
//!
//! Multi-byte fields are little-endian, the order the sender writes them in.
//! All fields are alignment-1 zerocopy byteorder types, so the header has no
//! implicit padding and parses without any unsafe code.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

// ── Chunk Header ─────────────────────────────────────────────────────────────

/// Prefix of every datagram on the wire.
///
/// ```text
/// [magic: u16][version: u8][frame_id: u32][chunk_index: u16][total_chunks: u16][payload...]
/// ```
///
/// Wire size: 11 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ChunkHeader {
    /// Sentinel identifying this chunking scheme. Always `CHUNK_MAGIC`.
    pub magic: U16<LittleEndian>,

    /// Wire format version. Currently 0x01.
    /// A receiver seeing an unknown version silently drops the chunk.
    pub version: u8,

    /// Sender-assigned frame counter. Wraps at `u32::MAX`.
    pub frame_id: U32<LittleEndian>,

    /// Zero-based position of this chunk within the frame.
    pub chunk_index: U16<LittleEndian>,

    /// Number of chunks composing the frame. Never zero on a valid chunk.
    pub total_chunks: U16<LittleEndian>,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(ChunkHeader, [u8; CHUNK_HEADER_LEN]);

impl ChunkHeader {
    pub fn new(frame_id: u32, chunk_index: u16, total_chunks: u16) -> Self {
        Self {
            magic: U16::new(CHUNK_MAGIC),
            version: CHUNK_VERSION,
            frame_id: U32::new(frame_id),
            chunk_index: U16::new(chunk_index),
            total_chunks: U16::new(total_chunks),
        }
    }

    /// Parse and validate the header at the start of `datagram`.
    ///
    /// Checks everything that can be judged from the header alone: length,
    /// magic, version, `total_chunks` in `(0, max_chunks]` and
    /// `chunk_index < total_chunks`. A datagram shorter than the header is
    /// rejected before any field is read.
    pub fn parse(datagram: &[u8], max_chunks: u16) -> Result<Self, WireError> {
        if datagram.len() < CHUNK_HEADER_LEN {
            return Err(WireError::TooShort(datagram.len()));
        }
        let header =
            Self::read_from_prefix(datagram).ok_or(WireError::TooShort(datagram.len()))?;

        if header.magic.get() != CHUNK_MAGIC {
            return Err(WireError::BadMagic(header.magic.get()));
        }
        if header.version != CHUNK_VERSION {
            return Err(WireError::UnknownVersion(header.version));
        }
        let total = header.total_chunks.get();
        if total == 0 || total > max_chunks {
            return Err(WireError::InvalidTotalChunks {
                total,
                max: max_chunks,
            });
        }
        let index = header.chunk_index.get();
        if index >= total {
            return Err(WireError::ChunkIndexOutOfRange { index, total });
        }
        Ok(header)
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id.get()
    }

    pub fn chunk_index(&self) -> u16 {
        self.chunk_index.get()
    }

    pub fn total_chunks(&self) -> u16 {
        self.total_chunks.get()
    }
}

// ── Sensor type tags ─────────────────────────────────────────────────────────

/// The sensor stream a frame belongs to, from the frame's leading type tag.
///
/// The tag is the first four bytes of the reassembled frame, read as a
/// little-endian `u32`. Decoding the sensor header behind it is left to the
/// consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// LiDAR depth map, `"DPTH"`.
    Depth,
    /// Camera image, `"RGBF"`.
    Rgb,
    /// Inertial samples, `"IMUF"`.
    Imu,
    Unknown(u32),
}

impl SensorKind {
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            tag::DEPTH => SensorKind::Depth,
            tag::RGB => SensorKind::Rgb,
            tag::IMU => SensorKind::Imu,
            other => SensorKind::Unknown(other),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            SensorKind::Depth => tag::DEPTH,
            SensorKind::Rgb => tag::RGB,
            SensorKind::Imu => tag::IMU,
            SensorKind::Unknown(other) => other,
        }
    }
}

impl From<u32> for SensorKind {
    fn from(tag: u32) -> Self {
        SensorKind::from_tag(tag)
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&tag_ascii(self.tag()))
    }
}

/// Render a type tag as its four characters, e.g. `0x44505448` → `"DPTH"`.
/// Non-printable bytes are shown as `.`.
pub fn tag_ascii(tag: u32) -> String {
    tag.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Known sensor type tags.
pub mod tag {
    pub const DEPTH: u32 = 0x4450_5448; // "DPTH"
    pub const RGB: u32 = 0x5247_4246; // "RGBF"
    pub const IMU: u32 = 0x494D_5546; // "IMUF"
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Size of `ChunkHeader` on the wire.
pub const CHUNK_HEADER_LEN: usize = 11;

/// Sentinel in the first two bytes of every chunk.
pub const CHUNK_MAGIC: u16 = 0xABCD;

/// Current chunk format version.
pub const CHUNK_VERSION: u8 = 0x01;

/// Length of the type tag at the head of a reassembled frame.
pub const TYPE_TAG_LEN: usize = 4;

/// Length of the little-endian CRC-32 at the tail of a reassembled frame.
pub const CHECKSUM_LEN: usize = 4;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Default ceiling on chunks per frame.
pub const MAX_CHUNKS: u16 = 8192;

/// Default ceiling on accumulated bytes per frame.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons a datagram is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("datagram of {0} bytes is shorter than the {} byte chunk header", CHUNK_HEADER_LEN)]
    TooShort(usize),

    #[error("datagram of {len} bytes exceeds maximum {max}")]
    TooLong { len: usize, max: usize },

    #[error("bad chunk magic: 0x{0:04x}")]
    BadMagic(u16),

    #[error("unknown chunk version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("invalid total chunk count {total} (allowed 1..={max})")]
    InvalidTotalChunks { total: u16, max: u16 },

    #[error("chunk index {index} out of range for {total} chunks")]
    ChunkIndexOutOfRange { index: u16, total: u16 },

    #[error("chunk declares {declared} total chunks but frame {frame_id} expects {expected}")]
    TotalChunksMismatch {
        frame_id: u32,
        declared: u16,
        expected: u16,
    },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
