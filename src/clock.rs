//! Timestamp sources
//!
//! All timestamps are microseconds since the Unix epoch.

use parking_lot::Mutex;
use std::sync::Arc;

pub trait Clock: Send {
    fn now(&self) -> u64;
}

/// Wall clock backed by `chrono`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp_micros().max(0) as u64
    }
}

/// Manually advanced clock for tests
///
/// Clones share the same time, so a test can keep a handle after handing one
/// to the warehouse.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<u64>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: u64) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, micros: u64) {
        *self.now.lock() += micros;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        *self.now.lock()
    }
}
