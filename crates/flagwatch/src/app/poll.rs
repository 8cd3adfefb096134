use clap::{Arg, ArgAction, Command};

pub fn watch_command() -> Command {
    with_poll_args(
        Command::new("watch")
            .about("Poll until interrupted, printing one line per updated category"),
    )
}

pub fn check_command() -> Command {
    with_poll_args(Command::new("check").about("Poll once and print the outcome"))
}

/// Overrides shared by every command that talks to the endpoint.
fn with_poll_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .help("Status endpoint URL (overrides poller.endpoint)")
                .value_name("URL"),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .short('c')
                .help("Category to poll; repeat for several (overrides poller.categories)")
                .value_name("CATEGORY")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .help("Delay between successful polls in milliseconds")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("retry-ms")
                .long("retry-ms")
                .help("Delay after a failed poll in milliseconds")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Output in JSON format")
                .action(ArgAction::SetTrue),
        )
}
