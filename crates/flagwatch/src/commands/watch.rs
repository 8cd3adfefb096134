use clap::ArgMatches;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use flagwatch_core::{FlagwatchConfig, Poller};

use super::helpers;
use crate::shutdown::wait_for_shutdown_signal;

pub(crate) fn handle_watch_command(
    matches: &ArgMatches,
    no_store: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = helpers::load_config(matches)?;
    let json = matches.get_flag("json");
    let store = helpers::open_store(&config, no_store)?;
    let poller = helpers::build_poller(&config, store, json)?;

    helpers::runtime()?.block_on(watch(poller, &config))
}

enum Exit {
    Signal,
    GaveUp,
}

async fn watch(
    mut poller: Poller,
    config: &FlagwatchConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(token.clone()));

    poller.start();
    info!(
        event = "cli.watch_started",
        endpoint = config.poller.endpoint.as_deref().unwrap_or_default(),
        categories = ?poller.config().categories,
    );
    eprintln!(
        "Watching {} categor{} (Ctrl-C to stop)",
        poller.config().categories.len(),
        if poller.config().categories.len() == 1 { "y" } else { "ies" },
    );

    let exit = tokio::select! {
        _ = token.cancelled() => Exit::Signal,
        _ = poller.wait() => Exit::GaveUp,
    };
    poller.stop();

    match exit {
        Exit::Signal => {
            info!(event = "cli.watch_completed");
            Ok(())
        }
        Exit::GaveUp => {
            eprintln!("Gave up after repeated poll failures. Run with -v for details.");
            error!(event = "cli.watch_failed", reason = "retries exhausted");
            Err("retries exhausted".into())
        }
    }
}
