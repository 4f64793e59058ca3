//! Host-side event values.
//!
//! Events are copied out of the engine as soon as they are polled; an
//! [`Event`] never refers back into engine memory.

use dwebble_rws::{EngineEvent, EventCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-issued identifier of one peer connection.
///
/// Unique among open connections. Zero is reserved for server-scoped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Identifier carried by events that concern no particular connection.
    pub const SERVER: ConnectionId = ConnectionId(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        ConnectionId(id)
    }
}

/// Discriminant of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    None,
    ClientConnected,
    ClientDisconnected,
    MessageReceived,
    Error,
}

impl EventKind {
    /// Total mapping from engine event codes; unknown codes are `None`.
    pub fn from_code(code: EventCode) -> Self {
        match code {
            EventCode::CLIENT_CONNECTED => EventKind::ClientConnected,
            EventCode::CLIENT_DISCONNECTED => EventKind::ClientDisconnected,
            EventCode::MESSAGE_RECEIVED => EventKind::MessageReceived,
            EventCode::ERROR => EventKind::Error,
            _ => EventKind::None,
        }
    }
}

/// One occurrence surfaced by [`crate::WebSocketServer::poll_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An event the engine reported with a kind this crate does not know
    None,
    ClientConnected(ConnectionId),
    ClientDisconnected(ConnectionId),
    /// A binary or text frame. Text arrives as its UTF-8 bytes. May be empty.
    MessageReceived {
        connection_id: ConnectionId,
        data: Vec<u8>,
    },
    /// Error on a connection, or on the server when the id is
    /// [`ConnectionId::SERVER`]
    Error {
        connection_id: ConnectionId,
        message: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::None => EventKind::None,
            Event::ClientConnected(_) => EventKind::ClientConnected,
            Event::ClientDisconnected(_) => EventKind::ClientDisconnected,
            Event::MessageReceived { .. } => EventKind::MessageReceived,
            Event::Error { .. } => EventKind::Error,
        }
    }

    /// The connection this event concerns, `None` for [`Event::None`].
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Event::None => None,
            Event::ClientConnected(id) | Event::ClientDisconnected(id) => Some(*id),
            Event::MessageReceived { connection_id, .. } | Event::Error { connection_id, .. } => {
                Some(*connection_id)
            }
        }
    }
}

impl From<EngineEvent> for Event {
    fn from(event: EngineEvent) -> Self {
        let connection_id = ConnectionId(event.connection_id);
        match EventKind::from_code(event.code) {
            EventKind::None => Event::None,
            EventKind::ClientConnected => Event::ClientConnected(connection_id),
            EventKind::ClientDisconnected => Event::ClientDisconnected(connection_id),
            EventKind::MessageReceived => Event::MessageReceived {
                connection_id,
                data: event.data.unwrap_or_default(),
            },
            EventKind::Error => Event::Error {
                connection_id,
                message: event.error.unwrap_or_default(),
            },
        }
    }
}
