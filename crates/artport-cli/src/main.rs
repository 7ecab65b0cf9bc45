use artport_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Logging falls back to stderr when the state directory is unusable.
    let _target = logging::init_logging();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("artport error: {:#}", err);
        std::process::exit(1);
    }
}
