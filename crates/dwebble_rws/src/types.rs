//! Boundary value types shared between the engine and its callers.
//!
//! Everything in this module crosses the engine boundary: status codes, event
//! codes, the flat configuration shape, and the events queued for polling.
//! Status and event codes are transparent integers rather than Rust enums so
//! that values the caller does not recognize can still be represented and
//! mapped instead of being undefined behavior at the C ABI.

use std::fmt;

/// Engine-issued connection identifier.
pub type ConnectionId = u64;

/// Outcome code returned by every fallible engine operation.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);
    pub const INVALID_HANDLE: StatusCode = StatusCode(1);
    pub const INVALID_PARAM: StatusCode = StatusCode(2);
    pub const ALREADY_RUNNING: StatusCode = StatusCode(3);
    pub const NOT_RUNNING: StatusCode = StatusCode(4);
    pub const BIND_FAILED: StatusCode = StatusCode(5);
    pub const TLS_ERROR: StatusCode = StatusCode(6);
    pub const RUNTIME_ERROR: StatusCode = StatusCode(7);
    pub const SEND_FAILED: StatusCode = StatusCode(8);
    pub const CONNECTION_CLOSED: StatusCode = StatusCode(9);

    /// Returns `true` for [`StatusCode::OK`].
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::OK => "ok",
            Self::INVALID_HANDLE => "invalid handle",
            Self::INVALID_PARAM => "invalid parameter",
            Self::ALREADY_RUNNING => "already running",
            Self::NOT_RUNNING => "not running",
            Self::BIND_FAILED => "bind failed",
            Self::TLS_ERROR => "tls error",
            Self::RUNTIME_ERROR => "runtime error",
            Self::SEND_FAILED => "send failed",
            Self::CONNECTION_CLOSED => "connection closed",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "unknown status {}", self.0),
        }
    }
}

/// Kind of a polled event.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode(pub i32);

impl EventCode {
    pub const NONE: EventCode = EventCode(0);
    pub const CLIENT_CONNECTED: EventCode = EventCode(1);
    pub const CLIENT_DISCONNECTED: EventCode = EventCode(2);
    pub const MESSAGE_RECEIVED: EventCode = EventCode(3);
    pub const ERROR: EventCode = EventCode(4);
}

/// Server configuration in the flat shape the engine consumes.
///
/// Absent values are `None`, never empty strings: an empty-but-present TLS
/// path is a request for TLS with an unusable certificate and fails with
/// [`StatusCode::TLS_ERROR`] at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Port to listen on, 0 lets the OS pick one
    pub port: u16,
    /// Textual bind address (IP literal or host name)
    pub bind_address: String,
    /// Comma-separated list of supported subprotocols
    pub subprotocols: Option<String>,
    /// PEM certificate chain path
    pub tls_cert_path: Option<String>,
    /// PEM private key path
    pub tls_key_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            subprotocols: None,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl EngineConfig {
    /// Splits the joined subprotocol string, dropping blanks.
    pub fn subprotocol_list(&self) -> Vec<String> {
        self.subprotocols
            .as_deref()
            .map(|joined| {
                joined
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One queued occurrence produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub code: EventCode,
    /// Zero for server-scoped events
    pub connection_id: ConnectionId,
    /// Present only for `MESSAGE_RECEIVED`
    pub data: Option<Vec<u8>>,
    /// Present only for `ERROR`
    pub error: Option<String>,
}

impl EngineEvent {
    pub fn connected(connection_id: ConnectionId) -> Self {
        Self {
            code: EventCode::CLIENT_CONNECTED,
            connection_id,
            data: None,
            error: None,
        }
    }

    pub fn disconnected(connection_id: ConnectionId) -> Self {
        Self {
            code: EventCode::CLIENT_DISCONNECTED,
            connection_id,
            data: None,
            error: None,
        }
    }

    pub fn message(connection_id: ConnectionId, data: Vec<u8>) -> Self {
        Self {
            code: EventCode::MESSAGE_RECEIVED,
            connection_id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(connection_id: ConnectionId, message: impl Into<String>) -> Self {
        Self {
            code: EventCode::ERROR,
            connection_id,
            data: None,
            error: Some(message.into()),
        }
    }
}
