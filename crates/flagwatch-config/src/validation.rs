//! Configuration validation logic.
//!
//! This module contains validation functions for configuration values,
//! ensuring they are valid before a poller is built from them.

use std::collections::HashSet;

use crate::errors::ConfigError;
use crate::types::{FlagwatchConfig, RetryStrategy, StoreSettings};

/// Whether `name` is usable as a category.
///
/// Category names double as watermark file names, so they are restricted to
/// ASCII alphanumerics plus `_`, `-` and `.`, and may not start with `.`.
pub fn is_valid_category_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Validate a FlagwatchConfig, returning an error if any values are invalid.
///
/// # Validation Rules
///
/// - Categories, if set, must be non-empty, unique and well-formed
/// - Intervals must be greater than zero
/// - With exponential retry, `max_retry_interval_ms` must not be below
///   `retry_interval_ms`
/// - Endpoint, if set, must be an `http://` or `https://` URL
pub fn validate_config(config: &FlagwatchConfig) -> Result<(), ConfigError> {
    let categories = config.poller.categories();
    if categories.is_empty() {
        return Err(ConfigError::InvalidConfiguration {
            message: "poller.categories must list at least one category".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for category in &categories {
        if !is_valid_category_name(category) {
            return Err(ConfigError::InvalidCategory {
                category: category.clone(),
                reason: "use letters, digits, '_', '-' or '.', not starting with '.'".to_string(),
            });
        }
        if !seen.insert(category.as_str()) {
            return Err(ConfigError::InvalidCategory {
                category: category.clone(),
                reason: "listed more than once".to_string(),
            });
        }
    }

    for (name, value) in [
        ("poller.poll_interval_ms", config.poller.poll_interval_ms),
        ("poller.retry_interval_ms", config.poller.retry_interval_ms),
        ("poller.request_timeout_ms", config.poller.request_timeout_ms),
        ("retry.max_retry_interval_ms", config.retry.max_retry_interval_ms),
    ] {
        if value == Some(0) {
            return Err(ConfigError::InvalidConfiguration {
                message: format!("{name} must be > 0"),
            });
        }
    }

    if config.retry.strategy() == RetryStrategy::Exponential
        && config.retry.max_retry_interval() < config.poller.retry_interval()
    {
        return Err(ConfigError::InvalidConfiguration {
            message: "retry.max_retry_interval_ms must be >= poller.retry_interval_ms".to_string(),
        });
    }

    if let Some(ref endpoint) = config.poller.endpoint {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidConfiguration {
                message: format!("poller.endpoint '{}' must be an http(s) URL", endpoint),
            });
        }
    }

    Ok(())
}

/// Validate only the `[store]` section.
///
/// Enough for commands that read or delete watermarks without polling.
pub fn validate_store_settings(store: &StoreSettings) -> Result<(), ConfigError> {
    if store.dir.as_ref().is_some_and(|dir| dir.as_os_str().is_empty()) {
        return Err(ConfigError::InvalidConfiguration {
            message: "store.dir must not be empty".to_string(),
        });
    }
    Ok(())
}
