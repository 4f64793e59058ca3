//! Callback-style event delivery.
//!
//! Hosts that prefer callbacks over matching on [`Event`] register handlers
//! here and pump them with [`crate::WebSocketServer::dispatch_events`].

use crate::event::{ConnectionId, Event};

type ConnectionHandler = Box<dyn FnMut(ConnectionId) + Send>;
type MessageHandler = Box<dyn FnMut(ConnectionId, &[u8]) + Send>;
type ErrorHandler = Box<dyn FnMut(ConnectionId, &str) + Send>;

/// Optional per-kind callbacks. Kinds without a handler are dropped.
#[derive(Default)]
pub struct EventHandlers {
    on_connected: Option<ConnectionHandler>,
    on_disconnected: Option<ConnectionHandler>,
    on_message: Option<MessageHandler>,
    on_error: Option<ErrorHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_client_connected(mut self, handler: impl FnMut(ConnectionId) + Send + 'static) -> Self {
        self.on_connected = Some(Box::new(handler));
        self
    }

    pub fn on_client_disconnected(mut self, handler: impl FnMut(ConnectionId) + Send + 'static) -> Self {
        self.on_disconnected = Some(Box::new(handler));
        self
    }

    pub fn on_message_received(
        mut self,
        handler: impl FnMut(ConnectionId, &[u8]) + Send + 'static,
    ) -> Self {
        self.on_message = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(ConnectionId, &str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Runs the handler matching `event`, if one is registered.
    pub fn dispatch(&mut self, event: Event) {
        match event {
            Event::None => {}
            Event::ClientConnected(id) => {
                if let Some(handler) = self.on_connected.as_mut() {
                    handler(id);
                }
            }
            Event::ClientDisconnected(id) => {
                if let Some(handler) = self.on_disconnected.as_mut() {
                    handler(id);
                }
            }
            Event::MessageReceived { connection_id, data } => {
                if let Some(handler) = self.on_message.as_mut() {
                    handler(connection_id, &data);
                }
            }
            Event::Error { connection_id, message } => {
                if let Some(handler) = self.on_error.as_mut() {
                    handler(connection_id, &message);
                }
            }
        }
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
