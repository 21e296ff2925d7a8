//! Ronin service entry point.
//!
//! ```text
//! --config path → load_config → logging::init → App (modules) → run
//!     build error / start error → logged, exit 1
//!     SIGINT / SIGTERM          → teardown, exit 0
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ronin_codebase::config::{load_config, LogConfig, Stage};
use ronin_codebase::observability::logging;

#[derive(Parser)]
#[command(name = "ronin-codebase")]
#[command(about = "Modular HTTP service with managed startup and shutdown", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/ronin.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(&LogConfig::default(), Stage::Development);
            tracing::error!(path = %cli.config.display(), error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let log_config = match config.section_or_default::<LogConfig>() {
        Ok(log_config) => log_config,
        Err(e) => {
            let _ = logging::init(&LogConfig::default(), config.stage());
            tracing::error!(error = %e, "invalid logging configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&log_config, config.stage()) {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!(
        app = %config.app().name,
        stage = ?config.stage(),
        version = env!("CARGO_PKG_VERSION"),
        "Configuration loaded"
    );

    match ronin_codebase::application(config).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "failed to run app");
            ExitCode::FAILURE
        }
    }
}
