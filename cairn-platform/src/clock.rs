use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use cairn_types::primitives::Timestamp;

/// Wall clock that tests can pin to a fixed time.
#[derive(Debug, Default)]
pub struct Clock {
    faked: AtomicBool,
    time: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unix time in seconds.
    pub fn now(&self) -> Timestamp {
        if self.faked.load(Ordering::Acquire) {
            return self.time.load(Ordering::Acquire);
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Pin the clock to `time`.
    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::Release);
        self.faked.store(true, Ordering::Release);
    }

    /// Return to the system clock.
    pub fn sync(&self) {
        self.faked.store(false, Ordering::Release);
    }
}
