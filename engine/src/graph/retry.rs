//! Retry policy for node execution failures.

use std::time::Duration;

/// How a node's failed execution should be retried by the graph runner.
#[derive(Clone, Debug)]
pub enum RetryPolicy {
    /// Never retry; the first failure is returned to the caller.
    None,
    /// Exponential backoff: `initial_delay * multiplier^attempt`, capped at `max_delay`,
    /// for up to `max_attempts` total tries.
    Exponential {
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    pub fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self::Exponential {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Delay before the given zero-indexed retry attempt (0 = first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Exponential {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                let scaled = initial_delay.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(scaled).min(*max_delay)
            }
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_policy_has_a_single_attempt_and_zero_delay() {
        let policy = RetryPolicy::None;
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn exponential_policy_caps_at_max_delay() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(1), 10.0);
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(1));
    }

    #[test]
    fn exponential_policy_grows_between_attempts() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(5), 2.0);
        assert!(policy.delay_for_attempt(1) > policy.delay_for_attempt(0));
    }
}
