//! Reassembly table — frames in flight, keyed by frame id.
//!
//! Each entry holds one slot per declared chunk. A frame leaves the table in
//! exactly one of four ways: all slots filled (complete), byte ceiling
//! exceeded (oversized), idle past `entry_timeout` (expired), or pushed out
//! by a newer frame when `max_in_flight` is reached (evicted).
//!
//! Senders reuse frame ids freely, so a completed id is forgotten at once and
//! the next chunk carrying it opens a fresh entry. Ids of dropped frames
//! (oversized, expired, evicted) are remembered for `resolved_ttl`; the
//! straggling chunks of a dropped frame are discarded instead of opening an
//! entry that can never complete.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;

use rxstream_core::config::ReassemblyConfig;
use rxstream_core::wire::WireError;

/// Result of inserting one chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored; the frame still has missing chunks.
    Incomplete { received: u16, total: u16 },
    /// The slot was already filled. Nothing changed.
    Duplicate,
    /// The frame id was dropped within `resolved_ttl`. Chunk discarded.
    Late,
    /// The last missing chunk arrived. Chunks concatenated in index order.
    Complete(Vec<u8>),
    /// The frame was dropped and its state freed.
    Dropped(DropReason),
}

/// Why `insert` dropped the frame it was adding to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Accumulated payload would exceed the frame byte ceiling.
    Oversized { bytes: usize, limit: usize },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Oversized { bytes, limit } => {
                write!(f, "oversized ({bytes} bytes > {limit})")
            }
        }
    }
}

/// Why a frame was removed outside of `insert`'s own outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// No chunk arrived for longer than the entry timeout.
    Expired { idle: Duration },
    /// Removed to make room for a newer frame.
    Capacity,
}

impl std::fmt::Display for EvictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictReason::Expired { idle } => write!(f, "expired after {}ms idle", idle.as_millis()),
            EvictReason::Capacity => write!(f, "evicted for capacity"),
        }
    }
}

/// A frame removed by a sweep or by capacity pressure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evicted {
    pub frame_id: u32,
    pub received: u16,
    pub total: u16,
    pub reason: EvictReason,
}

struct ReassemblyEntry {
    total_chunks: u16,
    received: u16,
    chunks: Vec<Option<Bytes>>,
    total_bytes: usize,
    last_touched: Instant,
}

impl ReassemblyEntry {
    fn new(total_chunks: u16, now: Instant) -> Self {
        Self {
            total_chunks,
            received: 0,
            chunks: vec![None; total_chunks as usize],
            total_bytes: 0,
            last_touched: now,
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.total_chunks
    }

    fn concatenate(self) -> Vec<u8> {
        let mut whole = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks.into_iter().flatten() {
            whole.extend_from_slice(&chunk);
        }
        whole
    }
}

pub struct ReassemblyTable {
    entries: HashMap<u32, ReassemblyEntry>,
    resolved: HashMap<u32, Instant>,
    evicted: Vec<Evicted>,
    max_frame_bytes: usize,
    max_in_flight: usize,
    entry_timeout: Duration,
    resolved_ttl: Duration,
    sweep_interval: Duration,
    last_sweep: Option<Instant>,
}

impl ReassemblyTable {
    pub fn new(limits: &ReassemblyConfig) -> Self {
        Self {
            entries: HashMap::new(),
            resolved: HashMap::new(),
            evicted: Vec::new(),
            max_frame_bytes: limits.max_frame_bytes,
            max_in_flight: limits.max_in_flight,
            entry_timeout: limits.entry_timeout(),
            resolved_ttl: limits.resolved_ttl(),
            sweep_interval: limits.sweep_interval(),
            last_sweep: None,
        }
    }

    /// Store one chunk's payload.
    ///
    /// `chunk_index < total_chunks` must already hold (the header parser
    /// checks it). A chunk whose `total_chunks` disagrees with the entry
    /// already in flight is rejected without touching the entry.
    pub fn insert(
        &mut self,
        frame_id: u32,
        chunk_index: u16,
        total_chunks: u16,
        payload: Bytes,
        now: Instant,
    ) -> Result<InsertOutcome, WireError> {
        if chunk_index >= total_chunks {
            return Err(WireError::ChunkIndexOutOfRange {
                index: chunk_index,
                total: total_chunks,
            });
        }
        self.sweep_if_due(now);

        if let Some(&dropped_at) = self.resolved.get(&frame_id) {
            if now.saturating_duration_since(dropped_at) < self.resolved_ttl {
                return Ok(InsertOutcome::Late);
            }
            self.resolved.remove(&frame_id);
        }

        if let Some(entry) = self.entries.get(&frame_id) {
            if entry.total_chunks != total_chunks {
                return Err(WireError::TotalChunksMismatch {
                    frame_id,
                    declared: total_chunks,
                    expected: entry.total_chunks,
                });
            }
        } else {
            self.make_room(now);
            self.entries
                .insert(frame_id, ReassemblyEntry::new(total_chunks, now));
        }

        let Some(entry) = self.entries.get_mut(&frame_id) else {
            return Ok(InsertOutcome::Late);
        };
        let slot = &mut entry.chunks[chunk_index as usize];
        if slot.is_some() {
            return Ok(InsertOutcome::Duplicate);
        }

        let bytes = entry.total_bytes + payload.len();
        if bytes > self.max_frame_bytes {
            self.entries.remove(&frame_id);
            self.remember_dropped(frame_id, now);
            return Ok(InsertOutcome::Dropped(DropReason::Oversized {
                bytes,
                limit: self.max_frame_bytes,
            }));
        }

        *slot = Some(payload);
        entry.received += 1;
        entry.total_bytes = bytes;
        entry.last_touched = now;

        if !entry.is_complete() {
            return Ok(InsertOutcome::Incomplete {
                received: entry.received,
                total: entry.total_chunks,
            });
        }

        let whole = match self.entries.remove(&frame_id) {
            Some(entry) => entry.concatenate(),
            None => return Ok(InsertOutcome::Late),
        };
        Ok(InsertOutcome::Complete(whole))
    }

    /// Evict entries idle for longer than the entry timeout and forget
    /// dropped ids older than `resolved_ttl`. Returns how many entries were
    /// evicted.
    pub fn sweep(&mut self, now: Instant) -> usize {
        self.last_sweep = Some(now);
        let timeout = self.entry_timeout;
        let ttl = self.resolved_ttl;

        self.resolved
            .retain(|_, at| now.saturating_duration_since(*at) < ttl);

        let before = self.evicted.len();
        let evicted = &mut self.evicted;
        self.entries.retain(|&frame_id, entry| {
            let idle = now.saturating_duration_since(entry.last_touched);
            if idle <= timeout {
                return true;
            }
            evicted.push(Evicted {
                frame_id,
                received: entry.received,
                total: entry.total_chunks,
                reason: EvictReason::Expired { idle },
            });
            false
        });

        let expired: Vec<u32> = self.evicted[before..].iter().map(|e| e.frame_id).collect();
        for frame_id in expired {
            self.remember_dropped(frame_id, now);
        }
        self.evicted.len() - before
    }

    fn remember_dropped(&mut self, frame_id: u32, now: Instant) {
        if !self.resolved_ttl.is_zero() {
            self.resolved.insert(frame_id, now);
        }
    }

    fn sweep_if_due(&mut self, now: Instant) {
        let due = match self.last_sweep {
            Some(last) => now.saturating_duration_since(last) >= self.sweep_interval,
            None => true,
        };
        if due {
            self.sweep(now);
        }
    }

    /// Evict the least recently touched entry if the table is full.
    fn make_room(&mut self, now: Instant) {
        if self.max_in_flight == 0 || self.entries.len() < self.max_in_flight {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_touched)
            .map(|(&frame_id, _)| frame_id);
        if let Some(frame_id) = oldest {
            if let Some(entry) = self.entries.remove(&frame_id) {
                self.evicted.push(Evicted {
                    frame_id,
                    received: entry.received,
                    total: entry.total_chunks,
                    reason: EvictReason::Capacity,
                });
                self.remember_dropped(frame_id, now);
            }
        }
    }

    /// Drain entries removed by sweeps and capacity pressure since the last call.
    pub fn take_evicted(&mut self) -> Vec<Evicted> {
        std::mem::take(&mut self.evicted)
    }

    pub fn contains(&self, frame_id: u32) -> bool {
        self.entries.contains_key(&frame_id)
    }

    /// Number of frames in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(received, total)` for a frame in flight.
    pub fn progress(&self, frame_id: u32) -> Option<(u16, u16)> {
        self.entries
            .get(&frame_id)
            .map(|entry| (entry.received, entry.total_chunks))
    }

    /// Payload bytes held for a frame in flight.
    pub fn buffered_bytes(&self, frame_id: u32) -> Option<usize> {
        self.entries.get(&frame_id).map(|entry| entry.total_bytes)
    }
}
