//! Time source abstraction
//!
//! The engine never reads the system clock directly; the surrounding
//! execution environment owns time. [`SystemClock`] is the wall-clock
//! default, [`ManualClock`] lets tests and simulations drive the time gate
//! deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current Unix timestamp
pub trait Clock: Send + Sync {
    /// Current time as Unix epoch seconds
    fn now(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock
///
/// Cloning shares the underlying instant, so a test can keep a handle and
/// advance time after handing the clock to the engine.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start)))
    }

    /// Jump to an absolute timestamp
    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs` seconds
    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
