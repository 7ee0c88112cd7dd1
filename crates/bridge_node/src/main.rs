use std::path::PathBuf;
use std::process::ExitCode;

use bridge_config::load_config;
use bridge_node::trace_util::configure_tracing;
use clap::Parser;
use tracing::error;

/// A bridge validator: watches token transfers into the foreign bridge
/// account and confirms them on the home bridge contract.
#[derive(Debug, Parser)]
#[command(name = "bridge-validator", version)]
struct Args {
    /// Path to a TOML config file. Every key can also be provided as an
    /// environment variable of the same uppercased name.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Configuration error: {error}");
            return ExitCode::FAILURE;
        }
    };
    configure_tracing(&config.logging);

    match bridge_node::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("Bridge validator failed: {error}");
            ExitCode::FAILURE
        }
    }
}
