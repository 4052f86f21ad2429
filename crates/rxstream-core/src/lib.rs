//! rxstream-core — wire format, checksum and configuration shared by the
//! RXStream receiver crates.

pub mod config;
pub mod crc;
pub mod wire;

pub use crc::Crc32;
pub use wire::{ChunkHeader, SensorKind, WireError};
