//! Core server implementation.
//!
//! This module contains the `Server` struct, the engine-side object behind a
//! handle. It owns a dedicated tokio runtime for its whole lifetime and can be
//! started and stopped repeatedly on that runtime. None of its methods block on
//! network I/O, so it is safe to drive from inside another async runtime.

use crate::{
    connection::ConnectionManager,
    error::EngineError,
    server::handlers::{handle_connection, ConnectionContext},
    tls,
    types::{ConnectionId, EngineConfig, EngineEvent, StatusCode},
};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Back-off after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The engine-side server instance.
///
/// # Lifecycle
///
/// `new` prepares the runtime without touching the network, `start` binds and
/// begins accepting, `stop` closes every connection and the listener. Dropping
/// the server stops it and shuts the runtime down in the background.
pub struct Server {
    /// Configuration this instance was created with
    config: EngineConfig,

    /// Runtime hosting the accept loop and every connection task
    runtime: Option<Runtime>,

    /// Registry of upgraded connections
    connection_manager: Arc<ConnectionManager>,

    /// Producer half of the event queue, cloned into every connection task
    event_sender: mpsc::UnboundedSender<EngineEvent>,

    /// Consumer half of the event queue, drained by `poll_event`
    event_receiver: Mutex<mpsc::UnboundedReceiver<EngineEvent>>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,

    /// Serializes start/stop and records whether we are accepting
    running: Mutex<bool>,

    /// Port actually bound, 0 when not running
    actual_port: AtomicU16,
}

impl Server {
    /// Creates a server for the given configuration.
    ///
    /// Only fails if the runtime cannot be built (thread spawn or I/O driver
    /// failure).
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("dwebble-rws")
            .enable_all()
            .build()
            .map_err(|e| EngineError::Runtime(format!("failed to build runtime: {e}")))?;

        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let (shutdown_sender, _) = broadcast::channel(1);

        Ok(Self {
            config,
            runtime: Some(runtime),
            connection_manager: Arc::new(ConnectionManager::new()),
            event_sender,
            event_receiver: Mutex::new(event_receiver),
            shutdown_sender,
            running: Mutex::new(false),
            actual_port: AtomicU16::new(0),
        })
    }

    /// Starts accepting connections.
    ///
    /// # Returns
    ///
    /// * `OK` once the listener is bound and the accept loop is running
    /// * `ALREADY_RUNNING` if the server is already started
    /// * `INVALID_PARAM` if only one of the TLS paths is set
    /// * `TLS_ERROR` if the certificate or key cannot be loaded
    /// * `BIND_FAILED` if the address cannot be bound
    /// * `RUNTIME_ERROR` for anything else
    pub fn start(&self) -> StatusCode {
        let Ok(mut running) = self.running.lock() else {
            return StatusCode::RUNTIME_ERROR;
        };
        if *running {
            return StatusCode::ALREADY_RUNNING;
        }

        match self.start_internal() {
            Ok(port) => {
                *running = true;
                self.actual_port.store(port, Ordering::Release);
                StatusCode::OK
            }
            Err(e) => {
                error!("❌ Failed to start WebSocket server: {}", e);
                e.status()
            }
        }
    }

    fn start_internal(&self) -> Result<u16, EngineError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| EngineError::Runtime("runtime already shut down".into()))?;

        let tls = match (&self.config.tls_cert_path, &self.config.tls_key_path) {
            (Some(cert), Some(key)) => Some(tls::acceptor_from_pem_files(cert, key)?),
            (None, None) => None,
            _ => return Err(EngineError::IncompleteTls),
        };

        let address = socket_address(&self.config.bind_address, self.config.port);
        let bind_err = |source: std::io::Error| EngineError::Bind {
            address: address.clone(),
            source,
        };

        let std_listener = std::net::TcpListener::bind(&address).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_listener.local_addr().map_err(bind_err)?;

        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(std_listener)
                .map_err(|e| EngineError::Runtime(format!("tokio listener creation failed: {e}")))?
        };

        let ctx = ConnectionContext {
            connection_manager: Arc::clone(&self.connection_manager),
            events: self.event_sender.clone(),
            subprotocols: self.config.subprotocol_list().into(),
            tls,
        };

        let shutdown_receiver = self.shutdown_sender.subscribe();
        runtime.spawn(accept_loop(
            listener,
            ctx,
            self.shutdown_sender.clone(),
            shutdown_receiver,
        ));

        let scheme = if is_tls(&self.config) { "wss" } else { "ws" };
        info!("🚀 WebSocket server listening on {}://{}", scheme, local_addr);
        Ok(local_addr.port())
    }

    /// Stops accepting and closes every open connection.
    ///
    /// Returns immediately; sockets finish closing on the engine runtime and
    /// each one still reports `ClientDisconnected` through the queue.
    pub fn stop(&self) -> StatusCode {
        let Ok(mut running) = self.running.lock() else {
            return StatusCode::RUNTIME_ERROR;
        };
        if !*running {
            return StatusCode::NOT_RUNNING;
        }

        info!("🛑 Shutting down WebSocket server...");
        let _ = self.shutdown_sender.send(());
        let closed = self.connection_manager.close_all("Server shutting down");
        self.actual_port.store(0, Ordering::Release);
        *running = false;

        info!("✅ Server stopped ({} connection(s) closed)", closed);
        StatusCode::OK
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().map(|running| *running).unwrap_or(false)
    }

    /// Removes the oldest queued event, if any. Never blocks.
    pub fn poll_event(&self) -> Option<EngineEvent> {
        self.event_receiver.lock().ok()?.try_recv().ok()
    }

    /// Queues a binary frame for one connection.
    pub fn send(&self, connection_id: ConnectionId, data: &[u8]) -> StatusCode {
        self.connection_manager
            .send_to_connection(connection_id, Message::Binary(data.to_vec().into()))
    }

    /// Queues a text frame for one connection.
    pub fn send_text(&self, connection_id: ConnectionId, text: &str) -> StatusCode {
        self.connection_manager
            .send_to_connection(connection_id, Message::Text(text.to_string().into()))
    }

    /// Requests closure of one connection.
    pub fn disconnect(&self, connection_id: ConnectionId) -> StatusCode {
        self.connection_manager.kick_connection(connection_id, None)
    }

    /// Bound port, 0 when not running.
    pub fn port(&self) -> u16 {
        self.actual_port.load(Ordering::Acquire)
    }

    pub fn connection_count(&self) -> usize {
        self.connection_manager.connection_count()
    }

    /// `address:port` summary.
    pub fn info(&self) -> String {
        format!("{}:{}", self.config.bind_address, self.port())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("🧹 Engine runtime released");
        }
    }
}

fn is_tls(config: &EngineConfig) -> bool {
    config.tls_cert_path.is_some() && config.tls_key_path.is_some()
}

/// Joins host and port, bracketing bare IPv6 literals.
fn socket_address(bind_address: &str, port: u16) -> String {
    if bind_address.contains(':') && !bind_address.starts_with('[') {
        format!("[{bind_address}]:{port}")
    } else {
        format!("{bind_address}:{port}")
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: ConnectionContext,
    shutdown_sender: broadcast::Sender<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("🛑 Accept loop stopping - shutdown initiated");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let ctx = ctx.clone();
                    // Subscribe before spawning so a stop racing the handshake is still seen
                    let connection_shutdown = shutdown_sender.subscribe();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, ctx, connection_shutdown).await {
                            warn!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    let _ = ctx.events.send(EngineEvent::error(0, format!("accept failed: {e}")));
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_address_brackets_ipv6() {
        assert_eq!(socket_address("127.0.0.1", 80), "127.0.0.1:80");
        assert_eq!(socket_address("::1", 80), "[::1]:80");
        assert_eq!(socket_address("[::1]", 80), "[::1]:80");
        assert_eq!(socket_address("localhost", 0), "localhost:0");
    }
}
