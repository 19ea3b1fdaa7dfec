//! Interrupt output line

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A level-triggered interrupt line. Setting the current level again is a
/// no-op for the interrupt controller.
pub trait LineInterrupt: Send {
    fn set_level(&self, high: bool);
}

#[derive(Debug, Default)]
struct Level {
    high: AtomicBool,
    raised: AtomicU64,
}

/// Shared interrupt line for wiring a port to a controller that samples the
/// level. Clones observe the same line.
#[derive(Debug, Clone, Default)]
pub struct LevelLine {
    level: Arc<Level>,
}

impl LevelLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.high.load(Ordering::Acquire)
    }

    /// Number of low-to-high transitions seen.
    pub fn raised_count(&self) -> u64 {
        self.level.raised.load(Ordering::Acquire)
    }
}

impl LineInterrupt for LevelLine {
    fn set_level(&self, high: bool) {
        let was_high = self.level.high.swap(high, Ordering::AcqRel);
        if high && !was_high {
            self.level.raised.fetch_add(1, Ordering::AcqRel);
        }
    }
}
