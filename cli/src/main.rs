use std::process::ExitCode;

use clap::Parser;
use retrykit_cli::Cli;
use tracing_subscriber::EnvFilter;

/// Exit code for bad arguments, unreadable settings and other setup failures.
const SETUP_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match Cli::parse().run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(SETUP_FAILURE)
        }
    }
}

fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
