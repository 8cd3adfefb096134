use flagwatch_core::init_logging;

mod app;
mod commands;
mod shutdown;

fn main() {
    let app = app::build_cli();
    let matches = app.get_matches();

    let verbose = matches.get_flag("verbose");
    init_logging(!verbose);

    if let Err(e) = commands::run_command(&matches) {
        // Already reported to the user by the command handler
        drop(e);
        std::process::exit(1);
    }
}
