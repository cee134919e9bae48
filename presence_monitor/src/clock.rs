//! Millisecond time source for interval gating.
//!
//! The counter is a `u32` that wraps after ~49.7 days, like a microcontroller `millis()`.
//! Every interval check goes through [`interval_elapsed`], which subtracts with wrapping
//! so a rollover between two timestamps does not stall or trigger the gate.

use std::time::{Duration, Instant};

pub trait Clock {
    /// Milliseconds since the clock was created, wrapping at `u32::MAX`.
    fn now_ms(&self) -> u32;

    /// Block for `ms` milliseconds. Only setup handshakes use this.
    fn sleep_ms(&self, ms: u32);
}

/// True when strictly more than `interval_ms` passed between `last_ms` and `now_ms`.
#[inline]
pub fn interval_elapsed(now_ms: u32, last_ms: u32, interval_ms: u32) -> bool {
    now_ms.wrapping_sub(last_ms) > interval_ms
}

/// Wall-clock implementation backed by [`Instant`].
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // truncation is the wrap
        self.start.elapsed().as_millis() as u32
    }

    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_exclusive() {
        assert!(!interval_elapsed(500, 0, 500));
        assert!(interval_elapsed(501, 0, 500));
    }

    #[test]
    fn interval_survives_counter_wrap() {
        let last = u32::MAX - 100;
        assert!(!interval_elapsed(200, last, 500));
        assert!(interval_elapsed(400, last, 500));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::new();
        let before = clock.now_ms();
        clock.sleep_ms(5);
        assert!(clock.now_ms().wrapping_sub(before) >= 5);
    }
}
