//! [`Clock`] implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use drip_core::traits::Clock;

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        // Saturate outside the u32 range instead of wrapping.
        chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the hub
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(now: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(now)),
        }
    }

    pub fn set(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`, saturating at `u32::MAX`.
    pub fn advance(&self, secs: u32) -> u32 {
        let next = self.now().saturating_add(secs);
        self.set(next);
        next
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        handle.advance(50);
        assert_eq!(clock.now(), 150);
        clock.set(u32::MAX - 1);
        assert_eq!(handle.advance(10), u32::MAX);
    }
}
