//! Poll scheduling: how long to wait before the next request.

use std::time::Duration;

use flagwatch_config::{FlagwatchConfig, RetryStrategy};

/// How failed polls are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub retry_interval: Duration,
    pub strategy: RetryStrategy,
    /// Ceiling for exponential growth. Ignored by `Fixed`.
    pub max_retry_interval: Duration,
    /// Consecutive failures tolerated before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Same delay after every failure, retried forever.
    pub fn fixed(retry_interval: Duration) -> Self {
        Self {
            retry_interval,
            strategy: RetryStrategy::Fixed,
            max_retry_interval: retry_interval,
            max_attempts: None,
        }
    }

    pub fn from_config(config: &FlagwatchConfig) -> Self {
        Self {
            retry_interval: config.poller.retry_interval(),
            strategy: config.retry.strategy(),
            max_retry_interval: config.retry.max_retry_interval(),
            max_attempts: config.retry.max_attempts(),
        }
    }
}

/// Tracks consecutive failures and computes the next poll delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    poll_interval: Duration,
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(poll_interval: Duration, policy: RetryPolicy) -> Self {
        Self {
            poll_interval,
            policy,
            consecutive_failures: 0,
        }
    }

    /// Record a successful poll. Always the regular poll interval.
    pub fn on_success(&mut self) -> Duration {
        self.consecutive_failures = 0;
        self.poll_interval
    }

    /// Record a failed poll.
    ///
    /// Returns `None` once `max_attempts` consecutive failures have been seen.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if let Some(max) = self.policy.max_attempts
            && self.consecutive_failures >= max
        {
            return None;
        }

        Some(self.retry_delay())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn retry_delay(&self) -> Duration {
        match self.policy.strategy {
            RetryStrategy::Fixed => self.policy.retry_interval,
            RetryStrategy::Exponential => {
                let exponent = self.consecutive_failures.saturating_sub(1).min(31);
                self.policy
                    .retry_interval
                    .checked_mul(1u32 << exponent)
                    .unwrap_or(self.policy.max_retry_interval)
                    .min(self.policy.max_retry_interval)
            }
        }
    }
}
