//! lagscale
//!
//! Runs KEDA Kafka scaler scenarios against the current cluster.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use lagscale_cli::config::{env_file_from_args, load_env_file};
use lagscale_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Env file first so clap's env fallbacks see its values
    let (env_file, explicit) = env_file_from_args(std::env::args_os());
    let env_loaded = load_env_file(&env_file, explicit);

    let cli = Cli::parse();

    // No subscriber yet, so this one goes to stderr
    if let Err(e) = cli.init_logging() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = env_loaded {
        error!(error = %e, "startup failed");
        return ExitCode::FAILURE;
    }

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "lagscale failed");
            ExitCode::FAILURE
        }
    }
}
