//! CLI entry point for the chunkstream daemon
//!
//! Parses command line arguments, initializes logging, and runs the daemon.

use chunkstream_daemon::{Config, Daemon};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Chunkstream Daemon - chunked video uploads with ffmpeg transcoding
#[derive(Parser, Debug)]
#[command(name = "chunkstream-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip the ffmpeg startup check. For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(config = %args.config.display(), "chunkstream daemon starting");

    // Missing config file falls back to defaults; a present but broken one
    // is an error.
    let config = if args.config.exists() {
        match Config::load(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "failed to load configuration");
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!("config file not found, using defaults with environment overrides");
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    let daemon_result = if args.skip_checks {
        info!("skipping startup checks (--skip-checks enabled)");
        Daemon::new_without_checks(config)
    } else {
        Daemon::new(config)
    };

    match daemon_result {
        Ok(daemon) => {
            if let Err(e) = daemon.run().await {
                error!(error = %e, "daemon error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to initialize daemon");
            ExitCode::FAILURE
        }
    }
}
