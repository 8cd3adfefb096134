use clap::ArgMatches;
use tracing::{error, info};

mod check;
mod config;
mod helpers;
mod reset;
mod watch;
mod watermarks;

pub fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    info!(event = "cli.app_started", version = env!("CARGO_PKG_VERSION"));

    let no_store = matches.get_flag("no-store");

    match matches.subcommand() {
        Some(("watch", sub_matches)) => watch::handle_watch_command(sub_matches, no_store),
        Some(("check", sub_matches)) => check::handle_check_command(sub_matches, no_store),
        Some(("watermarks", sub_matches)) => {
            watermarks::handle_watermarks_command(sub_matches, no_store)
        }
        Some(("reset", sub_matches)) => reset::handle_reset_command(sub_matches, no_store),
        Some(("config", _)) => config::handle_config_command(),
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    }
}
