//! Error types and handling for the server facade.
//!
//! Every facade operation reports through one closed taxonomy. Engine status
//! values are normalized here by a single total mapping, so nothing the engine
//! returns can escape the taxonomy.

use dwebble_rws::StatusCode;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Enumeration of possible server errors.
///
/// The first four are caller misuse detected by the facade itself; the rest
/// are operational failures reported by the engine and passed through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ServerError {
    /// No engine handle, or the engine does not know the connection
    #[error("invalid handle")]
    InvalidHandle,

    /// A parameter was malformed (for example only one TLS path set)
    #[error("invalid parameter")]
    InvalidParam,

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server is not running")]
    NotRunning,

    /// The listening socket could not be bound
    #[error("failed to bind listening socket")]
    BindFailed,

    /// Certificate or key could not be loaded
    #[error("TLS error")]
    TlsError,

    /// Any other engine failure, including unrecognized engine statuses
    #[error("runtime error")]
    RuntimeError,

    #[error("send failed")]
    SendFailed,

    /// The connection is already closed
    #[error("connection closed")]
    ConnectionClosed,
}

impl ServerError {
    /// Stable numeric code for this error.
    pub fn code(self) -> ResultCode {
        match self {
            ServerError::InvalidHandle => ResultCode::InvalidHandle,
            ServerError::InvalidParam => ResultCode::InvalidParam,
            ServerError::AlreadyRunning => ResultCode::AlreadyRunning,
            ServerError::NotRunning => ResultCode::NotRunning,
            ServerError::BindFailed => ResultCode::BindFailed,
            ServerError::TlsError => ResultCode::TlsError,
            ServerError::RuntimeError => ResultCode::RuntimeError,
            ServerError::SendFailed => ResultCode::SendFailed,
            ServerError::ConnectionClosed => ResultCode::ConnectionClosed,
        }
    }
}

/// The closed outcome set, including success, as stable `u8` values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok = 0,
    InvalidHandle = 1,
    InvalidParam = 2,
    AlreadyRunning = 3,
    NotRunning = 4,
    BindFailed = 5,
    TlsError = 6,
    RuntimeError = 7,
    SendFailed = 8,
    ConnectionClosed = 9,
}

impl From<Result<()>> for ResultCode {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}

impl From<ServerError> for ResultCode {
    fn from(error: ServerError) -> Self {
        error.code()
    }
}

/// Normalizes an engine status. Values outside the known set become
/// [`ServerError::RuntimeError`].
pub fn map_status(status: StatusCode) -> Result<()> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::INVALID_HANDLE => Err(ServerError::InvalidHandle),
        StatusCode::INVALID_PARAM => Err(ServerError::InvalidParam),
        StatusCode::ALREADY_RUNNING => Err(ServerError::AlreadyRunning),
        StatusCode::NOT_RUNNING => Err(ServerError::NotRunning),
        StatusCode::BIND_FAILED => Err(ServerError::BindFailed),
        StatusCode::TLS_ERROR => Err(ServerError::TlsError),
        StatusCode::RUNTIME_ERROR => Err(ServerError::RuntimeError),
        StatusCode::SEND_FAILED => Err(ServerError::SendFailed),
        StatusCode::CONNECTION_CLOSED => Err(ServerError::ConnectionClosed),
        _ => Err(ServerError::RuntimeError),
    }
}
