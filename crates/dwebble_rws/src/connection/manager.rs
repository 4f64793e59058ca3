//! Connection manager for tracking and managing client connections.
//!
//! This module provides the registry of open connections shared between the
//! server handle (which sends and disconnects from the caller's thread) and
//! the connection tasks running on the engine runtime.

use super::client::ClientConnection;
use crate::types::{ConnectionId, StatusCode};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Central registry for all client connections.
///
/// Ids come from a monotonically increasing counter starting at 1, so 0 is
/// never handed out and stays free for server-scoped events.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: DashMap<ConnectionId, ClientConnection>,

    /// Atomic counter for generating unique connection IDs
    next_id: AtomicU64,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers an upgraded connection and returns its id.
    ///
    /// `closing` is notified when the server kicks the connection or closes
    /// it during shutdown.
    pub fn add_connection(
        &self,
        remote_addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Message>,
        closing: Arc<Notify>,
    ) -> ConnectionId {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr, outgoing, closing);
        self.connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Removes a connection from the registry.
    ///
    /// Returns the removed record, or `None` if the id was not registered
    /// (already disconnected or kicked).
    pub fn remove_connection(&self, connection_id: ConnectionId) -> Option<ClientConnection> {
        let removed = self.connections.remove(&connection_id).map(|(_, c)| c);
        if let Some(connection) = &removed {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
        removed
    }

    /// Queues one frame for a specific connection.
    ///
    /// # Returns
    ///
    /// * `OK` if the frame was queued
    /// * `INVALID_HANDLE` if the id is not a registered connection
    /// * `CONNECTION_CLOSED` if the connection's writer has already exited
    pub fn send_to_connection(&self, connection_id: ConnectionId, message: Message) -> StatusCode {
        let Some(connection) = self.connections.get(&connection_id) else {
            debug!("Send to unknown connection {}", connection_id);
            return StatusCode::INVALID_HANDLE;
        };

        if connection.is_closed() || !connection.queue(message) {
            return StatusCode::CONNECTION_CLOSED;
        }
        StatusCode::OK
    }

    /// Kicks a connection by id, queuing a close frame and unregistering it.
    ///
    /// The socket itself closes asynchronously; its task still reports the
    /// disconnection once it exits.
    pub fn kick_connection(&self, connection_id: ConnectionId, reason: Option<String>) -> StatusCode {
        match self.connections.remove(&connection_id) {
            Some((_, connection)) => {
                connection.close(close_message(reason));
                debug!("👢 Kicked connection {}", connection_id);
                StatusCode::OK
            }
            None => StatusCode::INVALID_HANDLE,
        }
    }

    /// Sends a close frame to every connection and clears the registry.
    ///
    /// # Returns
    ///
    /// The number of connections that were closed.
    pub fn close_all(&self, reason: &str) -> usize {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for connection_id in ids {
            if let Some((_, connection)) = self.connections.remove(&connection_id) {
                connection.close(close_message(Some(reason.to_string())));
                closed += 1;
            }
        }
        closed
    }

    /// Point-in-time number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether the id is currently registered.
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }
}

fn close_message(reason: Option<String>) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: reason.unwrap_or_else(|| "Closed by server".into()).into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().expect("valid address")
    }

    fn signal() -> Arc<Notify> {
        Arc::new(Notify::new())
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = manager.add_connection(addr(), tx.clone(), signal());
        let second = manager.add_connection(addr(), tx, signal());
        assert_eq!(first, 1);
        assert!(second > first);
        assert_eq!(manager.connection_count(), 2);
    }

    #[test]
    fn test_send_reports_unknown_and_closed_connections() {
        let manager = ConnectionManager::new();
        assert_eq!(
            manager.send_to_connection(7, Message::Binary(vec![1].into())),
            StatusCode::INVALID_HANDLE
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add_connection(addr(), tx, signal());
        assert_eq!(
            manager.send_to_connection(id, Message::Binary(vec![1].into())),
            StatusCode::OK
        );

        drop(rx);
        assert_eq!(
            manager.send_to_connection(id, Message::Binary(vec![1].into())),
            StatusCode::CONNECTION_CLOSED
        );
    }

    #[tokio::test]
    async fn test_kick_queues_close_and_signals_reader() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let closing = signal();
        let id = manager.add_connection(addr(), tx, Arc::clone(&closing));

        assert_eq!(manager.kick_connection(id, None), StatusCode::OK);
        assert!(!manager.contains(id));
        assert!(matches!(rx.try_recv(), Ok(Message::Close(Some(_)))));

        // The stored permit completes immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), closing.notified())
            .await
            .expect("kick raised the closing signal");
        assert_eq!(manager.kick_connection(id, None), StatusCode::INVALID_HANDLE);
    }

    #[test]
    fn test_close_all_drains_registry() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.add_connection(addr(), tx.clone(), signal());
        manager.add_connection(addr(), tx, signal());

        assert_eq!(manager.close_all("shutdown"), 2);
        assert_eq!(manager.connection_count(), 0);
        assert!(matches!(rx.try_recv(), Ok(Message::Close(_))));
        assert!(matches!(rx.try_recv(), Ok(Message::Close(_))));
    }
}
