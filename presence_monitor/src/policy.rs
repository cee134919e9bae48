//! Retry policies for the two setup handshakes that can fail independently of the link.
//!
//! Engineering mode is an optional enhancement: a few immediate attempts, then give up.
//! The configuration read is needed for full operation: retried on a fixed period until
//! it succeeds once.

use crate::clock::{interval_elapsed, Clock};

/// A fixed number of immediate attempts with a pause after each failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedRetry {
    pub attempts: u32,
    pub delay_ms: u32,
}

impl BoundedRetry {
    /// Run `attempt` (called with the 1-based attempt number) until it returns `true`
    /// or the attempts are used up. Returns whether any attempt succeeded.
    pub fn run<K, E>(
        &self,
        clock: &K,
        mut attempt: impl FnMut(u32) -> Result<bool, E>,
    ) -> Result<bool, E>
    where
        K: Clock,
    {
        for n in 1..=self.attempts {
            if attempt(n)? {
                return Ok(true);
            }
            clock.sleep_ms(self.delay_ms);
        }
        Ok(false)
    }
}

/// Unbounded retries, at most one per `interval_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodicRetry {
    pub interval_ms: u32,
}

impl PeriodicRetry {
    pub fn due(&self, now_ms: u32, last_attempt_ms: u32) -> bool {
        interval_elapsed(now_ms, last_attempt_ms, self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClock;
    use std::convert::Infallible;

    #[test]
    fn bounded_stops_on_first_success() {
        let clock = MockClock::new();
        let policy = BoundedRetry { attempts: 3, delay_ms: 1000 };
        let mut seen = Vec::new();
        let ok = policy
            .run(&clock, |n| {
                seen.push(n);
                Ok::<_, Infallible>(n == 2)
            })
            .unwrap();
        assert!(ok);
        assert_eq!(seen, vec![1, 2]);
        // one pause, after the failed first attempt
        assert_eq!(clock.now_ms(), 1000);
    }

    #[test]
    fn bounded_gives_up() {
        let clock = MockClock::new();
        let policy = BoundedRetry { attempts: 3, delay_ms: 10 };
        let mut calls = 0;
        let ok = policy
            .run(&clock, |_| {
                calls += 1;
                Ok::<_, Infallible>(false)
            })
            .unwrap();
        assert!(!ok);
        assert_eq!(calls, 3);
    }

    #[test]
    fn periodic_due_after_interval() {
        let policy = PeriodicRetry { interval_ms: 30_000 };
        assert!(!policy.due(30_000, 0));
        assert!(policy.due(30_001, 0));
        assert!(policy.due(5, u32::MAX - 30_000));
    }
}
