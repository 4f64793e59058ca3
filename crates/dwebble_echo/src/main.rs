//! # Dwebble Echo Server
//!
//! A small host for the Dwebble facade: it pumps server events on a fixed
//! tick and echoes every message back to its sender.
//!
//! ```bash
//! # Run with default configuration (created on first start)
//! dwebble_echo
//!
//! # Override specific settings
//! dwebble_echo --bind 0.0.0.0 --port 8080 --log-level debug --tick-ms 5
//!
//! # JSON logging for production
//! dwebble_echo --json-logs
//! ```
//!
//! The server stops on SIGINT/SIGTERM (Ctrl+C on Windows).

use tracing::{error, info};

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let (mut config, created) = AppConfig::load_from_file(&args.config_path).await?;
    config.apply_overrides(&args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }
    if created {
        info!("📝 Created default configuration file: {}", args.config_path.display());
    }

    let app = match Application::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {e:?}");
        std::process::exit(1);
    }

    Ok(())
}
