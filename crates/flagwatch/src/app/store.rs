use clap::{Arg, ArgAction, Command};

pub fn watermarks_command() -> Command {
    Command::new("watermarks")
        .about("List stored watermarks")
        .arg(
            Arg::new("json")
                .long("json")
                .help("Output in JSON format")
                .action(ArgAction::SetTrue),
        )
}

pub fn reset_command() -> Command {
    Command::new("reset")
        .about("Delete stored watermarks so the next poll starts from scratch")
        .arg(
            Arg::new("category")
                .help("Category whose watermark to delete")
                .index(1)
                .required_unless_present("all"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("Delete every stored watermark")
                .action(ArgAction::SetTrue)
                .conflicts_with("category"),
        )
}
