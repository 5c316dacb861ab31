//! reclaim - time-bounded ephemeral environments

use std::process::ExitCode;

use clap::Parser;
use reclaim_cli::cli::Cli;
use reclaim_cli::output::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_errors = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            match json::format_error(&format!("{e:#}"), error_code(&e)) {
                Ok(body) if json_errors => println!("{body}"),
                _ => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn error_code(e: &anyhow::Error) -> &'static str {
    e.downcast_ref::<reclaim_cli::domain::ControllerError>()
        .map_or("error", reclaim_cli::domain::ControllerError::code)
}
