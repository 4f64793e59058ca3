//! The handle-based engine boundary.
//!
//! [`EngineBoundary`] is the complete set of calls a facade may make into an
//! engine. Handles are owned, move-only values: [`EngineBoundary::destroy`]
//! consumes its handle, so a handle cannot be released twice or used after
//! release.

use crate::server::Server;
use crate::types::{ConnectionId, EngineConfig, EngineEvent, StatusCode};
use tracing::error;

/// Handle-identified network engine.
///
/// Implementations perform their I/O on threads the caller does not see. Every
/// method must return promptly; none may block on network activity.
pub trait EngineBoundary {
    /// Opaque per-server state.
    type Handle;

    /// Allocates a server for `config` without touching the network.
    ///
    /// `None` means the engine could not allocate the resources for one.
    fn create(&self, config: &EngineConfig) -> Option<Self::Handle>;

    fn start(&self, handle: &mut Self::Handle) -> StatusCode;

    fn stop(&self, handle: &mut Self::Handle) -> StatusCode;

    /// Releases every resource held by `handle`.
    fn destroy(&self, handle: Self::Handle);

    /// Bound port, 0 when not listening.
    fn port(&self, handle: &Self::Handle) -> u16;

    fn connection_count(&self, handle: &Self::Handle) -> usize;

    /// `address:port` summary, `None` if the engine cannot produce one.
    fn info(&self, handle: &Self::Handle) -> Option<String>;

    fn send(&self, handle: &mut Self::Handle, connection_id: ConnectionId, data: &[u8]) -> StatusCode;

    fn send_text(&self, handle: &mut Self::Handle, connection_id: ConnectionId, text: &str) -> StatusCode;

    fn disconnect(&self, handle: &mut Self::Handle, connection_id: ConnectionId) -> StatusCode;

    /// Dequeues at most one event. Never blocks.
    fn poll(&self, handle: &mut Self::Handle) -> Option<EngineEvent>;
}

/// The tokio + tungstenite engine shipped with this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RwsEngine;

impl EngineBoundary for RwsEngine {
    type Handle = Server;

    fn create(&self, config: &EngineConfig) -> Option<Server> {
        match Server::new(config.clone()) {
            Ok(server) => Some(server),
            Err(e) => {
                error!("❌ Failed to create engine server: {}", e);
                None
            }
        }
    }

    fn start(&self, handle: &mut Server) -> StatusCode {
        handle.start()
    }

    fn stop(&self, handle: &mut Server) -> StatusCode {
        handle.stop()
    }

    fn destroy(&self, handle: Server) {
        drop(handle);
    }

    fn port(&self, handle: &Server) -> u16 {
        handle.port()
    }

    fn connection_count(&self, handle: &Server) -> usize {
        handle.connection_count()
    }

    fn info(&self, handle: &Server) -> Option<String> {
        Some(handle.info())
    }

    fn send(&self, handle: &mut Server, connection_id: ConnectionId, data: &[u8]) -> StatusCode {
        handle.send(connection_id, data)
    }

    fn send_text(&self, handle: &mut Server, connection_id: ConnectionId, text: &str) -> StatusCode {
        handle.send_text(connection_id, text)
    }

    fn disconnect(&self, handle: &mut Server, connection_id: ConnectionId) -> StatusCode {
        handle.disconnect(connection_id)
    }

    fn poll(&self, handle: &mut Server) -> Option<EngineEvent> {
        handle.poll_event()
    }
}
