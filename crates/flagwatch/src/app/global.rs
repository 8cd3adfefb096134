use clap::{Arg, ArgAction, Command};

pub fn root_command() -> Command {
    Command::new("flagwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Poll a status endpoint and report which categories have updates")
        .long_about("flagwatch periodically asks a status endpoint which categories (messages, activity, ...) changed since the last known watermarks, remembers the newest watermark per category, and reports every category flagged as updated.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-store")
                .long("no-store")
                .help("Keep watermarks in memory only; nothing is read from or written to disk")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
}

pub fn config_command() -> Command {
    Command::new("config").about("Print the effective configuration as TOML")
}
