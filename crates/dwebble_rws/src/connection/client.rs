//! Client connection representation.
//!
//! A `ClientConnection` is the registry's view of one upgraded WebSocket: the
//! peer address, the queue feeding its writer task, and the signal its reader
//! waits on when the server closes the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;

/// Represents an individual client connection to the server.
#[derive(Debug)]
pub struct ClientConnection {
    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// Queue drained by this connection's writer task
    outgoing: mpsc::UnboundedSender<Message>,

    /// Raised once the server has queued a close frame
    closing: Arc<Notify>,
}

impl ClientConnection {
    /// Creates a new client connection record.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    /// * `outgoing` - Sender half of the writer queue
    /// * `closing` - Signal shared with the connection's reader loop
    pub fn new(
        remote_addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Message>,
        closing: Arc<Notify>,
    ) -> Self {
        Self {
            remote_addr,
            outgoing,
            closing,
        }
    }

    /// Queues a frame for the writer task.
    ///
    /// Returns `false` once the writer has exited, i.e. the socket is gone.
    pub fn queue(&self, message: Message) -> bool {
        self.outgoing.send(message).is_ok()
    }

    /// Queues `close` and tells the reader to stop waiting on the peer.
    ///
    /// The notification keeps a permit, so a reader that is not yet waiting
    /// still observes it.
    pub fn close(&self, close: Message) {
        self.queue(close);
        self.closing.notify_one();
    }

    /// Whether the writer task has exited.
    pub fn is_closed(&self) -> bool {
        self.outgoing.is_closed()
    }
}
