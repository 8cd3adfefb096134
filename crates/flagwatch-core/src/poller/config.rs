use std::time::Duration;

use flagwatch_config::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_INTERVAL_MS, FlagwatchConfig};

use crate::clock::RetryPolicy;
use crate::types::{Category, InvalidCategoryName};

/// Everything a [`Poller`](super::Poller) needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Fixed at construction.
    pub categories: Vec<Category>,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl PollerConfig {
    /// Default timing: poll every 5 s, retry every 30 s forever.
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            retry: RetryPolicy::fixed(Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS)),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_config(config: &FlagwatchConfig) -> Result<Self, InvalidCategoryName> {
        let categories = config
            .poller
            .categories()
            .into_iter()
            .map(Category::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            categories,
            poll_interval: config.poller.poll_interval(),
            retry: RetryPolicy::from_config(config),
        })
    }
}
