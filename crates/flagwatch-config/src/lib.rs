//! # flagwatch-config
//!
//! TOML configuration types, loading, and validation for flagwatch.
//!
//! Single source of truth for `FlagwatchConfig` and the policy enums the
//! poller is built from. Depends only on `flagwatch-paths`.

mod defaults;
mod loading;
mod validation;

pub mod errors;
pub mod types;

// Public API re-exports
pub use defaults::{
    DEFAULT_MAX_RETRY_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_INTERVAL_MS,
};
pub use errors::ConfigError;
pub use loading::{
    load_hierarchy, load_hierarchy_from, load_hierarchy_unvalidated,
    load_hierarchy_unvalidated_from, merge_configs,
};
pub use types::{
    DispatchSettings, FlagwatchConfig, HandlerErrorPolicy, PollerSettings, RetrySettings,
    RetryStrategy, StoreSettings,
};
pub use validation::{is_valid_category_name, validate_config, validate_store_settings};

impl FlagwatchConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy() -> Result<Self, ConfigError> {
        loading::load_hierarchy()
    }

    /// Load the hierarchy without validating it.
    ///
    /// See [`loading::load_hierarchy_unvalidated`] for details.
    pub fn load_hierarchy_unvalidated() -> Result<Self, ConfigError> {
        loading::load_hierarchy_unvalidated()
    }

    /// Validate the configuration.
    ///
    /// See [`validation::validate_config`] for details.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }
}
