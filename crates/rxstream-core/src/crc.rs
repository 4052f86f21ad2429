//! CRC-32/IEEE (the 802.3 / zlib checksum) used for frame integrity.
//!
//! Reflected polynomial 0xEDB88320, initial value and final XOR all-ones.
//! Backed by `crc32fast`; callers construct one `Crc32` and keep it.

use crc32fast::Hasher;

#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32;

impl Crc32 {
    pub const fn new() -> Self {
        Crc32
    }

    /// Checksum of `data`.
    pub fn checksum(&self, data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Checksum of several slices as if they were one contiguous buffer.
    pub fn checksum_parts<'a, I>(&self, parts: I) -> u32
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize()
    }
}
