//! Configuration types.
//!
//! Every field is optional so that partial files from different sources can be
//! merged field by field. Accessor methods resolve unset fields to the
//! built-in defaults in [`crate::defaults`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::defaults::{
    DEFAULT_MAX_RETRY_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_INTERVAL_MS, default_categories,
};

/// Top-level configuration, one table per concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagwatchConfig {
    #[serde(default)]
    pub poller: PollerSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// `[poller]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollerSettings {
    /// Status endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Categories polled for. Fixed for the lifetime of a poller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    /// Delay between successful polls. Default: 5000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Delay before retrying after a failed poll. Default: 30000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,

    /// Transport timeout for a single request. Default: 10000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl PollerSettings {
    pub fn categories(&self) -> Vec<String> {
        self.categories.clone().unwrap_or_else(default_categories)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.unwrap_or(DEFAULT_RETRY_INTERVAL_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            endpoint: override_config
                .endpoint
                .clone()
                .or_else(|| base.endpoint.clone()),
            categories: override_config
                .categories
                .clone()
                .or_else(|| base.categories.clone()),
            poll_interval_ms: override_config.poll_interval_ms.or(base.poll_interval_ms),
            retry_interval_ms: override_config
                .retry_interval_ms
                .or(base.retry_interval_ms),
            request_timeout_ms: override_config
                .request_timeout_ms
                .or(base.request_timeout_ms),
        }
    }
}

/// How the retry delay evolves across consecutive failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Always wait `retry_interval_ms`.
    #[default]
    Fixed,
    /// Double the delay per consecutive failure, capped at `max_retry_interval_ms`.
    Exponential,
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryStrategy::Fixed => write!(f, "fixed"),
            RetryStrategy::Exponential => write!(f, "exponential"),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RetryStrategy>,

    /// Upper bound for exponential retry delays. Default: 300000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry_interval_ms: Option<u64>,

    /// Consecutive failures tolerated before the cycle gives up.
    /// `0` or unset means retry forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl RetrySettings {
    pub fn strategy(&self) -> RetryStrategy {
        self.strategy.unwrap_or_default()
    }

    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_millis(
            self.max_retry_interval_ms
                .unwrap_or(DEFAULT_MAX_RETRY_INTERVAL_MS),
        )
    }

    /// `None` means unlimited.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts.filter(|n| *n > 0)
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            strategy: override_config.strategy.or(base.strategy),
            max_retry_interval_ms: override_config
                .max_retry_interval_ms
                .or(base.max_retry_interval_ms),
            max_attempts: override_config.max_attempts.or(base.max_attempts),
        }
    }
}

/// What dispatch does when a handler fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerErrorPolicy {
    /// Log the failure and keep dispatching the remaining categories.
    #[default]
    Isolate,
    /// Stop dispatching the remaining categories of the current result.
    Abort,
}

impl std::fmt::Display for HandlerErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerErrorPolicy::Isolate => write!(f, "isolate"),
            HandlerErrorPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_errors: Option<HandlerErrorPolicy>,
}

impl DispatchSettings {
    pub fn handler_errors(&self) -> HandlerErrorPolicy {
        self.handler_errors.unwrap_or_default()
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            handler_errors: override_config.handler_errors.or(base.handler_errors),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Reject writes that would move a stored watermark backward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_monotonic: Option<bool>,

    /// Overrides `~/.flagwatch/watermarks`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl StoreSettings {
    pub fn enforce_monotonic(&self) -> bool {
        self.enforce_monotonic.unwrap_or(false)
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            enforce_monotonic: override_config.enforce_monotonic.or(base.enforce_monotonic),
            dir: override_config.dir.clone().or_else(|| base.dir.clone()),
        }
    }
}

impl FlagwatchConfig {
    /// Copy with every unset field filled in from the built-in defaults.
    ///
    /// Used to show the effective configuration. `endpoint` and `store.dir`
    /// have no default and stay unset.
    pub fn resolved(&self) -> Self {
        Self {
            poller: PollerSettings {
                endpoint: self.poller.endpoint.clone(),
                categories: Some(self.poller.categories()),
                poll_interval_ms: Some(self.poller.poll_interval().as_millis() as u64),
                retry_interval_ms: Some(self.poller.retry_interval().as_millis() as u64),
                request_timeout_ms: Some(self.poller.request_timeout().as_millis() as u64),
            },
            retry: RetrySettings {
                strategy: Some(self.retry.strategy()),
                max_retry_interval_ms: Some(self.retry.max_retry_interval().as_millis() as u64),
                max_attempts: Some(self.retry.max_attempts().unwrap_or(0)),
            },
            dispatch: DispatchSettings {
                handler_errors: Some(self.dispatch.handler_errors()),
            },
            store: StoreSettings {
                enforce_monotonic: Some(self.store.enforce_monotonic()),
                dir: self.store.dir.clone(),
            },
        }
    }

    /// The configured endpoint, or `MissingEndpoint`.
    pub fn require_endpoint(&self) -> Result<&str, crate::ConfigError> {
        self.poller
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(crate::ConfigError::MissingEndpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = FlagwatchConfig::default();
        assert_eq!(config.poller.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.poller.retry_interval(), Duration::from_secs(30));
        assert_eq!(config.retry.strategy(), RetryStrategy::Fixed);
        assert_eq!(config.retry.max_attempts(), None);
        assert_eq!(config.dispatch.handler_errors(), HandlerErrorPolicy::Isolate);
        assert!(!config.store.enforce_monotonic());
    }

    #[test]
    fn test_zero_max_attempts_means_unlimited() {
        let retry = RetrySettings {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert_eq!(retry.max_attempts(), None);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[poller]
endpoint = "https://intranet.example.org/@@status-flags"
categories = ["messages", "presence"]
poll_interval_ms = 2000
retry_interval_ms = 15000

[retry]
strategy = "exponential"
max_attempts = 5

[dispatch]
handler_errors = "abort"

[store]
enforce_monotonic = true
"#;
        let config: FlagwatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.poller.categories(),
            vec!["messages".to_string(), "presence".to_string()]
        );
        assert_eq!(config.poller.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.retry.strategy(), RetryStrategy::Exponential);
        assert_eq!(config.retry.max_attempts(), Some(5));
        assert_eq!(config.dispatch.handler_errors(), HandlerErrorPolicy::Abort);
        assert!(config.store.enforce_monotonic());
    }

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let config: FlagwatchConfig = toml::from_str("").unwrap();
        assert_eq!(config, FlagwatchConfig::default());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result: Result<FlagwatchConfig, _> = toml::from_str("[retry]\nstrategy = \"jitter\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_poller_merge_prefers_override() {
        let base = PollerSettings {
            endpoint: Some("https://a.example".to_string()),
            poll_interval_ms: Some(1000),
            ..Default::default()
        };
        let over = PollerSettings {
            poll_interval_ms: Some(2000),
            ..Default::default()
        };
        let merged = PollerSettings::merge(&base, &over);
        assert_eq!(merged.endpoint.as_deref(), Some("https://a.example"));
        assert_eq!(merged.poll_interval_ms, Some(2000));
    }

    #[test]
    fn test_resolved_fills_defaults() {
        let resolved = FlagwatchConfig::default().resolved();
        assert_eq!(resolved.poller.poll_interval_ms, Some(5000));
        assert_eq!(resolved.retry.strategy, Some(RetryStrategy::Fixed));
        assert_eq!(resolved.retry.max_attempts, Some(0));
        assert!(resolved.poller.endpoint.is_none());
    }

    #[test]
    fn test_require_endpoint() {
        let mut config = FlagwatchConfig::default();
        assert!(matches!(
            config.require_endpoint(),
            Err(crate::ConfigError::MissingEndpoint)
        ));
        config.poller.endpoint = Some("http://localhost:8080/status".to_string());
        assert_eq!(
            config.require_endpoint().unwrap(),
            "http://localhost:8080/status"
        );
    }
}
