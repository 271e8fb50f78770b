//! Bounded retry with exponential backoff
//!
//! Everything load-bearing on this node (Wi-Fi, broker session, sensor
//! fleet construction) is acquired through [`retry`]: a bounded attempt
//! loop that sleeps `min(base * 2^attempt, cap)` between failures, logs a
//! warning before each sleep, and reports exhaustion instead of panicking
//! or restarting. Callers decide whether exhaustion is fatal.
//!
//! Sleeping goes through the [`Sleeper`] seam so the node can light-sleep
//! to save power and tests can record the requested delays instead of
//! waiting them out.

use std::fmt::Display;
use std::time::Duration;

use log::{error, warn};

/// Cap on any single backoff delay, in seconds.
pub const BACKOFF_CAP_SECS: u64 = 300;

/// Retry policy, passed by value into each invocation.
///
/// Delay before retry `k` (0-indexed) is `min(base * 2^k, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts before reporting exhaustion.
    pub max_attempts: u32,
    /// Base backoff delay in seconds.
    pub backoff_base_secs: u64,
    /// Upper bound on any single delay, in seconds.
    pub backoff_cap_secs: u64,
    /// Pause used by the fatal path before restarting, so the critical
    /// log line has a chance to flush.
    pub escalation_sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_secs: 10,
            backoff_cap_secs: BACKOFF_CAP_SECS,
            escalation_sleep: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt budget and base delay.
    pub fn new(max_attempts: u32, backoff_base_secs: u64) -> Self {
        Self {
            max_attempts,
            backoff_base_secs,
            ..Self::default()
        }
    }

    /// Backoff delay before retry `attempt` (0-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let secs = self
            .backoff_base_secs
            .saturating_mul(factor)
            .min(self.backoff_cap_secs);
        Duration::from_secs(secs)
    }
}

/// All retries failed; the wrapped operation never succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    /// Attempts that were made.
    pub attempts: u32,
}

/// Seam for sleeping between retries.
pub trait Sleeper {
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Busy sleep via `std::thread::sleep`.
#[derive(Debug, Default, Clone)]
pub struct StdSleeper;

impl Sleeper for StdSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays instead of sleeping. For tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    /// Every delay requested, in order.
    pub slept: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}

/// Invoke `op` up to `policy.max_attempts` times, sleeping the backoff
/// delay between failures.
///
/// Any `Err` counts as a failed attempt. On exhaustion returns
/// [`Exhausted`]; mapping that to a fatal restart or a degraded mode is
/// the caller's decision.
pub fn retry<T, E, F>(
    name: &str,
    policy: &RetryPolicy,
    sleeper: &mut dyn Sleeper,
    mut op: F,
) -> Result<T, Exhausted>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    for attempt in 0..policy.max_attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                // Last attempt gets no sleep; exhaustion is reported instead.
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.backoff_delay(attempt);
                    warn!(
                        "{name} failed (attempt {}/{}): {e}; retrying in {}s",
                        attempt + 1,
                        policy.max_attempts,
                        delay.as_secs()
                    );
                    sleeper.sleep(delay);
                } else {
                    warn!(
                        "{name} failed (attempt {}/{}): {e}",
                        attempt + 1,
                        policy.max_attempts
                    );
                }
            }
        }
    }
    error!("max retries reached for {name}");
    Err(Exhausted {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Nope;

    impl Display for Nope {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "nope")
        }
    }

    #[test]
    fn succeeds_without_sleeping() {
        let mut sleeper = RecordingSleeper::default();
        let result = retry("op", &RetryPolicy::default(), &mut sleeper, || {
            Ok::<_, Nope>(42)
        });
        assert_eq!(result, Ok(42));
        assert!(sleeper.slept.is_empty());
    }

    #[test]
    fn invokes_exactly_max_attempts_then_exhausts() {
        let policy = RetryPolicy::new(4, 2);
        let mut sleeper = RecordingSleeper::default();
        let mut calls = 0u32;
        let result = retry("op", &policy, &mut sleeper, || {
            calls += 1;
            Err::<(), _>(Nope)
        });
        assert_eq!(result, Err(Exhausted { attempts: 4 }));
        assert_eq!(calls, 4);
        // No sleep after the final failure.
        assert_eq!(sleeper.slept.len(), 3);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::new(8, 60);
        let mut sleeper = RecordingSleeper::default();
        let _ = retry("op", &policy, &mut sleeper, || Err::<(), _>(Nope));
        assert_eq!(
            sleeper.slept,
            vec![
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(240),
                Duration::from_secs(300),
                Duration::from_secs(300),
                Duration::from_secs(300),
                Duration::from_secs(300),
            ]
        );
    }

    #[test]
    fn recovers_after_transient_failures() {
        let policy = RetryPolicy::new(5, 1);
        let mut sleeper = RecordingSleeper::default();
        let mut calls = 0u32;
        let result = retry("op", &policy, &mut sleeper, || {
            calls += 1;
            if calls < 3 {
                Err(Nope)
            } else {
                Ok("up")
            }
        });
        assert_eq!(result, Ok("up"));
        assert_eq!(calls, 3);
        assert_eq!(sleeper.slept.len(), 2);
    }

    proptest! {
        #[test]
        fn delay_law_holds(base in 1u64..120, attempt in 0u32..16) {
            let policy = RetryPolicy::new(1, base);
            let expected = (base << attempt.min(32)).min(BACKOFF_CAP_SECS);
            prop_assert_eq!(
                policy.backoff_delay(attempt),
                Duration::from_secs(expected)
            );
        }

        #[test]
        fn delay_never_exceeds_cap(base in 1u64..10_000, attempt in 0u32..64) {
            let policy = RetryPolicy::new(1, base);
            prop_assert!(policy.backoff_delay(attempt).as_secs() <= BACKOFF_CAP_SECS);
        }
    }
}
