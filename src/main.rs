use std::process::ExitCode;

use clap::Parser;
use pipetest::cli;

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default level
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    match cli::run(cli::Cli::parse()).await {
        Ok(summary) if summary.all_passed() => ExitCode::SUCCESS,
        Ok(summary) => {
            eprintln!(
                "{} of {} test cases failed",
                summary.failed + summary.errored,
                summary.total
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
