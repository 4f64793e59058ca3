//! Configuration management for the echo server.
//!
//! Settings come from a TOML file (created with defaults when missing) and
//! are then overridden by command-line flags.

use crate::cli::CliArgs;
use dwebble::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default tick interval for serde deserialization
fn default_tick_interval() -> u64 {
    16
}

fn default_stats_interval() -> u64 {
    30
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// WebSocket server settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind to (e.g., "127.0.0.1" or "::")
    pub bind_address: String,
    /// Port to listen on, 0 for an ephemeral port
    pub port: u16,
    /// Subprotocols offered during the upgrade, in preference order
    #[serde(default)]
    pub subprotocols: Vec<String>,
    /// PEM certificate chain; TLS needs both this and `tls_key_path`
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    /// PEM private key
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
    /// How often events are pumped, in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// How often statistics are logged, in seconds (0 to disable)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9001,
            subprotocols: Vec::new(),
            tls_cert_path: None,
            tls_key_path: None,
            tick_interval_ms: default_tick_interval(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration. The flag is
    /// `true` when the file was created, so the caller can report it once
    /// logging is up.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    pub async fn load_from_file(path: &Path) -> Result<(Self, bool), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if path.exists() {
            let content = tokio::fs::read_to_string(path).await.map_err(io_err)?;
            let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            Ok((config, false))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await.map_err(io_err)?;
            Ok((default_config, true))
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if let Some(tick_ms) = args.tick_ms {
            self.server.tick_interval_ms = tick_ms;
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind address cannot be empty".to_string()));
        }

        if self.server.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.server.tls_cert_path.is_some() != self.server.tls_key_path.is_some() {
            return Err(ConfigError::Invalid(
                "tls_cert_path and tls_key_path must be set together".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Builds the facade configuration.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.server.port,
            bind_address: self.server.bind_address.clone(),
            subprotocols: self.server.subprotocols.clone(),
            tls_cert_path: self.server.tls_cert_path.clone(),
            tls_key_path: self.server.tls_key_path.clone(),
        }
    }
}
