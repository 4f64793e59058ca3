//! The server facade.
//!
//! [`WebSocketServer`] owns at most one engine handle and wraps it in a small
//! lifecycle state machine. It never touches a socket itself.

use crate::config::ServerConfig;
use crate::dispatch::EventHandlers;
use crate::error::{map_status, Result, ServerError};
use crate::event::{ConnectionId, Event};
use dwebble_rws::{EngineBoundary, RwsEngine};
use tracing::{debug, info, warn};

/// Handle-owning WebSocket server facade.
///
/// # Lifecycle
///
/// `new` allocates the engine handle, `start`/`stop` move between running and
/// stopped as often as needed, and dropping the facade (or calling
/// [`WebSocketServer::destroy`]) stops the server if it is running and
/// releases the handle exactly once.
///
/// If the engine cannot allocate a handle the facade is still constructed but
/// stays handle-less: it never runs, queries return zero values, and data
/// operations fail with [`ServerError::InvalidHandle`].
///
/// # Examples
///
/// ```rust,no_run
/// use dwebble::{Event, ServerConfig, WebSocketServer};
///
/// let mut server = WebSocketServer::new(ServerConfig::new(8080));
/// server.start()?;
/// while let Some(event) = server.poll_event() {
///     if let Event::MessageReceived { connection_id, data } = event {
///         server.send(connection_id, &data)?;
///     }
/// }
/// # Ok::<(), dwebble::ServerError>(())
/// ```
pub struct WebSocketServer<E: EngineBoundary = RwsEngine> {
    engine: E,
    handle: Option<E::Handle>,
    config: ServerConfig,
    running: bool,
}

impl WebSocketServer<RwsEngine> {
    /// Creates a facade backed by the bundled engine.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_engine(RwsEngine, config)
    }
}

impl<E: EngineBoundary> WebSocketServer<E> {
    /// Creates a facade over an arbitrary engine.
    ///
    /// Never fails; see the type docs for what happens when the engine cannot
    /// allocate a handle.
    pub fn with_engine(engine: E, config: ServerConfig) -> Self {
        let handle = engine.create(&config.to_engine_config());
        if handle.is_none() {
            warn!("⚠️ Engine could not allocate a server handle; facade is inert");
        } else {
            debug!("🔧 Server handle created for {}:{}", config.bind_address, config.port);
        }

        Self {
            engine,
            handle,
            config,
            running: false,
        }
    }

    /// Starts accepting connections.
    ///
    /// # Errors
    ///
    /// * [`ServerError::AlreadyRunning`] if the server is running
    /// * [`ServerError::RuntimeError`] if there is no engine handle
    /// * [`ServerError::InvalidParam`] if only one TLS path is configured
    /// * whatever the engine reports otherwise (`BindFailed`, `TlsError`, ...)
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            debug!("Start requested while already running");
            return Err(ServerError::AlreadyRunning);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(ServerError::RuntimeError);
        };
        if self.config.has_incomplete_tls() {
            debug!("Start rejected: TLS needs both a certificate and a key");
            return Err(ServerError::InvalidParam);
        }
        if self.config.has_non_utf8_tls_path() {
            debug!("Start rejected: TLS paths must be valid UTF-8");
            return Err(ServerError::InvalidParam);
        }

        match map_status(self.engine.start(handle)) {
            Ok(()) => {
                self.running = true;
                info!("🚀 WebSocket server started on {}", self.info());
                Ok(())
            }
            Err(e) => {
                warn!("❌ WebSocket server failed to start: {}", e);
                Err(e)
            }
        }
    }

    /// Stops the server and closes every connection.
    ///
    /// The facade is marked stopped even when the engine reports a failure;
    /// that failure is still returned.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Err(ServerError::NotRunning);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(ServerError::NotRunning);
        };

        self.running = false;
        let result = map_status(self.engine.stop(handle));
        match &result {
            Ok(()) => info!("🛑 WebSocket server stopped"),
            Err(e) => warn!("⚠️ Engine reported an error while stopping: {}", e),
        }
        result
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Bound port, 0 when there is no handle or the server is stopped.
    pub fn port(&self) -> u16 {
        self.handle.as_ref().map_or(0, |h| self.engine.port(h))
    }

    pub fn connection_count(&self) -> usize {
        self.handle.as_ref().map_or(0, |h| self.engine.connection_count(h))
    }

    /// `address:port` summary, empty when there is no handle.
    pub fn info(&self) -> String {
        self.handle
            .as_ref()
            .and_then(|h| self.engine.info(h))
            .unwrap_or_default()
    }

    /// The configuration this facade was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether an engine handle is held.
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Queues a binary message for one connection.
    pub fn send(&mut self, connection_id: ConnectionId, data: &[u8]) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(ServerError::InvalidHandle)?;
        map_status(self.engine.send(handle, connection_id.0, data))
    }

    /// Queues a UTF-8 text message for one connection.
    pub fn send_text(&mut self, connection_id: ConnectionId, text: &str) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(ServerError::InvalidHandle)?;
        map_status(self.engine.send_text(handle, connection_id.0, text))
    }

    /// Requests closure of one connection.
    ///
    /// Completion is observed later as [`Event::ClientDisconnected`].
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(ServerError::InvalidHandle)?;
        map_status(self.engine.disconnect(handle, connection_id.0))
    }

    /// Takes the oldest pending event, if any. Never blocks.
    pub fn poll_event(&mut self) -> Option<Event> {
        let handle = self.handle.as_mut()?;
        self.engine.poll(handle).map(Event::from)
    }

    /// Drains every pending event into `handlers`.
    ///
    /// # Returns
    ///
    /// The number of events taken from the queue, including any of unknown
    /// kind that had no handler to run.
    pub fn dispatch_events(&mut self, handlers: &mut EventHandlers) -> usize {
        let mut drained = 0;
        while let Some(event) = self.poll_event() {
            handlers.dispatch(event);
            drained += 1;
        }
        drained
    }

    /// Stops the server if needed and releases the engine handle.
    ///
    /// Leaves a handle-less facade behind; calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.handle.is_none() {
            return;
        }
        if self.running {
            let _ = self.stop();
        }
        if let Some(handle) = self.handle.take() {
            self.engine.destroy(handle);
            debug!("🧹 Server handle released");
        }
    }
}

impl<E: EngineBoundary> Drop for WebSocketServer<E> {
    fn drop(&mut self) {
        self.destroy();
    }
}
