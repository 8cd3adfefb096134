//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.flagwatch/config.toml`
//! 3. **Project config** - `./.flagwatch/config.toml`
//! 4. **CLI arguments** - applied by the caller after loading

use std::fs;
use std::path::{Path, PathBuf};

use flagwatch_paths::FlagwatchPaths;
use tracing::{debug, warn};

use crate::errors::ConfigError;
use crate::types::{
    DispatchSettings, FlagwatchConfig, PollerSettings, RetrySettings, StoreSettings,
};
use crate::validation::validate_config;

/// Load configuration from the hierarchy of config files.
///
/// Missing config files are not errors. Parse and validation errors are.
pub fn load_hierarchy() -> Result<FlagwatchConfig, ConfigError> {
    let config = load_hierarchy_unvalidated()?;
    validate_config(&config)?;
    Ok(config)
}

/// Like [`load_hierarchy`], but without validation.
///
/// For callers that layer their own overrides on top and validate the
/// result themselves.
pub fn load_hierarchy_unvalidated() -> Result<FlagwatchConfig, ConfigError> {
    let user_config = match FlagwatchPaths::resolve() {
        Ok(paths) => Some(paths.user_config()),
        Err(e) => {
            warn!(
                event = "config.user_config_unavailable",
                error = %e,
                "Skipping user config"
            );
            None
        }
    };
    let project_root = std::env::current_dir()?;
    load_hierarchy_unvalidated_from(user_config.as_deref(), &project_root)
}

/// Load and merge the user config file and the project config under
/// `project_root`, then validate the result.
pub fn load_hierarchy_from(
    user_config: Option<&Path>,
    project_root: &Path,
) -> Result<FlagwatchConfig, ConfigError> {
    let config = load_hierarchy_unvalidated_from(user_config, project_root)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load and merge the user config file and the project config under
/// `project_root`. Parse errors are reported; values are not validated.
pub fn load_hierarchy_unvalidated_from(
    user_config: Option<&Path>,
    project_root: &Path,
) -> Result<FlagwatchConfig, ConfigError> {
    let mut config = FlagwatchConfig::default();

    let project_config = FlagwatchPaths::project_config(project_root);
    let sources: [Option<PathBuf>; 2] = [user_config.map(Path::to_path_buf), Some(project_config)];

    for path in sources.iter().flatten() {
        if let Some(loaded) = load_config_file(path)? {
            config = merge_configs(config, loaded);
        }
    }

    Ok(config)
}

/// Load a configuration file. `Ok(None)` if the file does not exist.
fn load_config_file(path: &Path) -> Result<Option<FlagwatchConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(event = "config.file_missing", path = %path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(ConfigError::IoError {
                source: std::io::Error::new(e.kind(), format!("'{}': {}", path.display(), e)),
            });
        }
    };

    let config: FlagwatchConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
            message: format!("'{}': {}", path.display(), e),
        })?;

    debug!(event = "config.file_loaded", path = %path.display());
    Ok(Some(config))
}

/// Merge two configurations, with override_config taking precedence.
///
/// Override values replace base values only where they are set.
pub fn merge_configs(base: FlagwatchConfig, override_config: FlagwatchConfig) -> FlagwatchConfig {
    FlagwatchConfig {
        poller: PollerSettings::merge(&base.poller, &override_config.poller),
        retry: RetrySettings::merge(&base.retry, &override_config.retry),
        dispatch: DispatchSettings::merge(&base.dispatch, &override_config.dispatch),
        store: StoreSettings::merge(&base.store, &override_config.store),
    }
}
