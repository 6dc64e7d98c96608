//! Subscriber position cell with explicit memory ordering
//!
//! The cell is written only by the image that owns it and read by anyone
//! holding a reference. Writers publish with release ordering so a reader
//! that acquire-loads the position also observes every frame consumed up to
//! it.

use std::sync::atomic::{AtomicI64, Ordering};

/// A 64-bit stream position with acquire/release accessors
#[derive(Debug)]
pub struct PositionCell {
    value: AtomicI64,
}

impl PositionCell {
    /// Create a new cell holding `initial`
    pub fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Load the position with acquire ordering
    pub fn load_acquire(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Load the position with relaxed ordering
    ///
    /// Use this for quick checks where consistency isn't critical
    pub fn load_relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Store a new position with release ordering
    pub fn store_release(&self, position: i64) {
        self.value.store(position, Ordering::Release);
    }
}

impl Default for PositionCell {
    fn default() -> Self {
        Self::new(0)
    }
}
