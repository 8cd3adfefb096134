use flagwatch_core::FlagwatchConfig;

use super::helpers;

/// Print the merged config, then fail if it does not validate.
///
/// Showing invalid values lets the user see which layer set them.
pub(crate) fn handle_config_command() -> Result<(), Box<dyn std::error::Error>> {
    let config = FlagwatchConfig::load_hierarchy_unvalidated()
        .inspect_err(|e| helpers::report(e, "Could not load config"))?;

    print!("{}", toml::to_string_pretty(&config.resolved())?);

    config
        .validate()
        .inspect_err(|e| helpers::report(e, "Invalid configuration"))?;
    Ok(())
}
