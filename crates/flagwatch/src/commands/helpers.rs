use std::sync::Arc;

use clap::ArgMatches;
use flagwatch_config::validate_store_settings;
use serde_json::json;
use tracing::{error, warn};

use flagwatch_core::{
    Category, Dispatcher, FileStore, FlagwatchConfig, FlagwatchError, HandlerError, HttpSource,
    Indicator, MemoryStore, Poller, PollerConfig, WatermarkStore,
};

/// Load the config hierarchy, apply the command-line overrides, and validate.
///
/// Validation runs once, after the overrides, so a flag can replace a bad
/// file value. Config problems are fatal: the error is printed and returned.
pub(crate) fn load_config(
    matches: &ArgMatches,
) -> Result<FlagwatchConfig, Box<dyn std::error::Error>> {
    let config = FlagwatchConfig::load_hierarchy_unvalidated().inspect_err(|e| {
        report(e, "Could not load config");
        eprintln!("Tip: Check ~/.flagwatch/config.toml and ./.flagwatch/config.toml for syntax errors.");
    })?;

    resolve_config(config, matches)
}

/// Overrides first, then the full validation.
pub(crate) fn resolve_config(
    mut config: FlagwatchConfig,
    matches: &ArgMatches,
) -> Result<FlagwatchConfig, Box<dyn std::error::Error>> {
    apply_overrides(&mut config, matches);

    config
        .validate()
        .inspect_err(|e| report(e, "Invalid configuration"))?;
    Ok(config)
}

/// Config for commands that only touch stored watermarks.
///
/// Only `[store]` is validated; poller settings are irrelevant here.
pub(crate) fn load_store_config() -> Result<FlagwatchConfig, Box<dyn std::error::Error>> {
    let config = FlagwatchConfig::load_hierarchy_unvalidated()
        .inspect_err(|e| report(e, "Could not load config"))?;
    validate_store_settings(&config.store)
        .inspect_err(|e| report(e, "Invalid configuration"))?;
    Ok(config)
}

/// Command-line flags win over every config file.
pub(crate) fn apply_overrides(config: &mut FlagwatchConfig, matches: &ArgMatches) {
    if let Some(endpoint) = matches.get_one::<String>("endpoint") {
        config.poller.endpoint = Some(endpoint.clone());
    }
    if let Some(categories) = matches.get_many::<String>("category") {
        config.poller.categories = Some(categories.cloned().collect());
    }
    if let Some(interval) = matches.get_one::<u64>("interval-ms") {
        config.poller.poll_interval_ms = Some(*interval);
    }
    if let Some(retry) = matches.get_one::<u64>("retry-ms") {
        config.poller.retry_interval_ms = Some(*retry);
    }
}

/// File store from `[store]`, or a memory store with `--no-store`.
pub(crate) fn open_store(
    config: &FlagwatchConfig,
    no_store: bool,
) -> Result<Arc<dyn WatermarkStore>, Box<dyn std::error::Error>> {
    if no_store {
        return Ok(Arc::new(MemoryStore::new(
            config.store.enforce_monotonic().into(),
        )));
    }
    let store = open_file_store(config)?;
    Ok(Arc::new(store))
}

pub(crate) fn open_file_store(
    config: &FlagwatchConfig,
) -> Result<FileStore, Box<dyn std::error::Error>> {
    let store = FileStore::from_settings(&config.store)
        .inspect_err(|e| report(e, "Could not locate the watermark directory"))?;
    Ok(store)
}

/// Dispatcher with a printing handler for every configured category.
pub(crate) fn printing_dispatcher(
    config: &PollerConfig,
    policy: flagwatch_core::HandlerErrorPolicy,
    json: bool,
) -> Arc<Dispatcher> {
    let dispatcher = Arc::new(Dispatcher::new(policy));
    for category in &config.categories {
        dispatcher.register(
            category.clone(),
            move |category: &Category, indicator: Indicator| -> Result<(), HandlerError> {
                println!("{}", format_update(category, indicator, json));
                Ok(())
            },
        );
    }
    dispatcher
}

pub(crate) fn format_update(category: &Category, indicator: Indicator, json: bool) -> String {
    let now = chrono::Utc::now().to_rfc3339();
    if json {
        json!({
            "category": category,
            "indicator": indicator,
            "at": now,
        })
        .to_string()
    } else {
        match indicator {
            Indicator::Count(count) => format!("{now}  {category}  {count} new"),
            Indicator::Flag(_) => format!("{now}  {category}  updated"),
        }
    }
}

/// Build the poller the way `watch` and `check` run it: over HTTP.
pub(crate) fn build_poller(
    config: &FlagwatchConfig,
    store: Arc<dyn WatermarkStore>,
    json: bool,
) -> Result<Poller, Box<dyn std::error::Error>> {
    let endpoint = config
        .require_endpoint()
        .inspect_err(|e| report(e, "No endpoint configured"))?;
    let source = HttpSource::new(endpoint, config.poller.request_timeout())
        .inspect_err(|e| report(e, "Invalid endpoint"))?;
    let poller_config =
        PollerConfig::from_config(config).inspect_err(|e| report(e, "Invalid category"))?;

    let dispatcher = printing_dispatcher(&poller_config, config.dispatch.handler_errors(), json);
    Ok(Poller::new(poller_config, Arc::new(source), store, dispatcher))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Print `err` for the user and log it at a level matching its origin.
pub(crate) fn report(err: &dyn FlagwatchError, context: &str) {
    eprintln!("{context}: {err}");
    if err.is_user_error() {
        warn!(event = "cli.command_failed", error_code = err.error_code(), error = %err);
    } else {
        error!(event = "cli.command_failed", error_code = err.error_code(), error = %err);
    }
}
