//! Error types for engine operations.
//!
//! Internal failures carry enough context to be logged; at the boundary each
//! one collapses into a [`StatusCode`].

use crate::types::StatusCode;

/// Enumeration of possible engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Only one of the certificate and key paths was supplied
    #[error("TLS requires both a certificate and a private key path")]
    IncompleteTls,

    /// Failed to bind the listening socket
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Certificate or key could not be loaded into a TLS acceptor
    #[error("TLS error: {0}")]
    Tls(#[from] crate::tls::TlsError),

    /// TLS handshake or WebSocket upgrade with a client failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The engine runtime could not perform the operation
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl EngineError {
    /// Boundary status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::IncompleteTls => StatusCode::INVALID_PARAM,
            EngineError::Bind { .. } => StatusCode::BIND_FAILED,
            EngineError::Tls(_) => StatusCode::TLS_ERROR,
            EngineError::Handshake(_) | EngineError::Runtime(_) => StatusCode::RUNTIME_ERROR,
        }
    }
}
