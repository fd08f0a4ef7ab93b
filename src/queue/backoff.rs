//! Retry backoff policy for the delivery queue.

use std::time::Duration;

use crate::config::QueueConfig;

/// Policy computing how long a failed item waits before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Constant delay between attempts.
    Fixed(Duration),
    /// Doubling delay, capped at a maximum.
    Exponential {
        /// Delay after the first failure.
        base: Duration,
        /// Upper bound for the delay.
        max: Duration,
    },
}

impl BackoffPolicy {
    /// Build the policy configured in the queue section.
    pub fn from_config(config: &QueueConfig) -> Self {
        let base = Duration::from_secs(config.backoff_base_secs);
        match config.backoff_strategy.as_str() {
            "fixed" => BackoffPolicy::Fixed(base),
            _ => BackoffPolicy::Exponential {
                base,
                max: Duration::from_secs(config.backoff_max_secs),
            },
        }
    }

    /// Delay before the next attempt, given the number of failed attempts
    /// so far (at least 1).
    pub fn delay(&self, attempts: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed(delay) => *delay,
            BackoffPolicy::Exponential { base, max } => {
                let shift = attempts.saturating_sub(1).min(16);
                let delay = base.saturating_mul(1u32 << shift);
                delay.min(*max)
            }
        }
    }
}
