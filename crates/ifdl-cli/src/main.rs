use ifdl_core::logging;

mod cli;

use crate::cli::CliCommand;

/// Exit code for configuration and usage errors (the verdict uses 0 and 1).
const EXIT_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable ({:#}), logging to stderr", err);
    }

    match CliCommand::run_from_args().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("ifdl error: {:#}", err);
            std::process::exit(EXIT_ERROR);
        }
    }
}
