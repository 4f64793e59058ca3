//! Server configuration and its translation into the engine's shape.

use dwebble_rws::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one WebSocket server.
///
/// The facade takes its own copy at construction; later changes to a config
/// value never affect a facade built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on, 0 lets the engine pick an ephemeral port
    pub port: u16,

    /// Address to bind to
    pub bind_address: String,

    /// Supported subprotocols in preference order, empty disables negotiation
    pub subprotocols: Vec<String>,

    /// PEM certificate chain. TLS is enabled when both paths are set.
    pub tls_cert_path: Option<PathBuf>,

    /// PEM private key
    pub tls_key_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            subprotocols: Vec::new(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    pub fn with_subprotocols<I, S>(mut self, subprotocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subprotocols = subprotocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls_cert_path = Some(cert_path.into());
        self.tls_key_path = Some(key_path.into());
        self
    }

    /// Whether both TLS paths are present.
    pub fn is_tls(&self) -> bool {
        present(&self.tls_cert_path).is_some() && present(&self.tls_key_path).is_some()
    }

    /// Exactly one of the TLS paths is present.
    pub(crate) fn has_incomplete_tls(&self) -> bool {
        present(&self.tls_cert_path).is_some() != present(&self.tls_key_path).is_some()
    }

    /// A present TLS path that the engine's UTF-8 config cannot carry.
    pub(crate) fn has_non_utf8_tls_path(&self) -> bool {
        [&self.tls_cert_path, &self.tls_key_path]
            .into_iter()
            .filter_map(present)
            .any(|p| p.to_str().is_none())
    }

    /// Converts to the flat shape the engine consumes.
    ///
    /// Empty lists and empty paths become `None`, never empty strings.
    /// Subprotocol entries are split on commas and trimmed, and blank names
    /// are dropped, so `[""]` disables negotiation just like `[]`. A path
    /// that is not valid UTF-8 is also `None`; `WebSocketServer::start`
    /// rejects such a config before it reaches the engine.
    pub fn to_engine_config(&self) -> EngineConfig {
        let names: Vec<&str> = self
            .subprotocols
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        let subprotocols = if names.is_empty() {
            None
        } else {
            Some(names.join(","))
        };

        EngineConfig {
            port: self.port,
            bind_address: self.bind_address.clone(),
            subprotocols,
            tls_cert_path: path_string(&self.tls_cert_path),
            tls_key_path: path_string(&self.tls_key_path),
        }
    }
}

fn present(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

fn path_string(path: &Option<PathBuf>) -> Option<String> {
    present(path).and_then(Path::to_str).map(str::to_string)
}
