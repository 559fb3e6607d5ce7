//! # Unique ID Sequencers
//!
//! Monotonically increasing id sources, safe under concurrent callers.
//!
//! Two variants: [`FastSequencer`] covers packet correlation ids within one
//! peer session (u32, wraps at the 32-bit boundary; pending-request lifetime
//! is short relative to wraparound), and [`LongSequencer`] covers definition
//! ids, where the wider u64 space means ids are never reused while the
//! owning process is alive.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// In-process u32 id source for packet correlation.
#[derive(Debug)]
pub struct FastSequencer {
    next: AtomicU32,
}

impl FastSequencer {
    /// Start at 1; 0 is still a legal id after wraparound.
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Hand out the next id, wrapping at the unsigned 32-bit boundary.
    ///
    /// Duplicates cannot be observed while fewer than 2^32 requests are
    /// concurrently pending.
    #[inline]
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for FastSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Wide u64 id source for identifiers that must never repeat in-process.
#[derive(Debug)]
pub struct LongSequencer {
    next: AtomicU64,
}

impl LongSequencer {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    #[inline]
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for LongSequencer {
    fn default() -> Self {
        Self::new()
    }
}
