mod global;
mod poll;
mod store;


use clap::Command;

pub fn build_cli() -> Command {
    global::root_command()
        .subcommand(poll::watch_command())
        .subcommand(poll::check_command())
        .subcommand(store::watermarks_command())
        .subcommand(store::reset_command())
        .subcommand(global::config_command())
}
