//! Main application logic and lifecycle management.
//!
//! The `Application` owns one facade and pumps it on a fixed tick, the same
//! way a frame-driven host would. Every received message is echoed back to
//! the connection it came from.

use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::signals::wait_for_shutdown_signal;
use dwebble::{ConnectionId, EventHandlers, WebSocketServer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Messages received during a tick, waiting to be echoed.
type Outbox = Arc<Mutex<VecDeque<(ConnectionId, Vec<u8>)>>>;

/// How an echoed payload goes back on the wire.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

impl<'a> Reply<'a> {
    /// Valid UTF-8 is echoed as text, everything else as binary.
    pub fn for_payload(data: &'a [u8]) -> Self {
        match std::str::from_utf8(data) {
            Ok(text) => Reply::Text(text),
            Err(_) => Reply::Binary(data),
        }
    }
}

/// Running counters reported with the periodic statistics.
#[derive(Debug, Default)]
struct Stats {
    connected: AtomicU64,
    disconnected: AtomicU64,
    errors: AtomicU64,
    echoed: AtomicU64,
}

/// Echo server application.
pub struct Application {
    config: AppConfig,
    server: WebSocketServer,
    stats: Arc<Stats>,
}

impl Application {
    /// Creates the facade from a validated configuration.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        display_banner();

        let server = WebSocketServer::new(config.to_server_config());
        if !server.has_handle() {
            anyhow::bail!("the WebSocket engine could not allocate a server");
        }

        Ok(Self {
            config,
            server,
            stats: Arc::new(Stats::default()),
        })
    }

    /// Starts the server and pumps events until a shutdown signal arrives.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.server.start()?;
        info!("🌟 Echo server ready at {}", self.server.info());

        let outbox: Outbox = Arc::new(Mutex::new(VecDeque::new()));
        let mut handlers = self.event_handlers(Arc::clone(&outbox));

        let mut tick = tokio::time::interval(Duration::from_millis(self.config.server.tick_interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stats_every = self.config.server.stats_interval_secs;
        let mut stats_tick =
            tokio::time::interval(Duration::from_secs(stats_every.max(1)));
        stats_tick.tick().await;

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    result?;
                    break;
                }
                _ = tick.tick() => {
                    self.server.dispatch_events(&mut handlers);
                    self.flush_outbox(&outbox);
                }
                _ = stats_tick.tick(), if stats_every > 0 => {
                    self.log_stats();
                }
            }
        }

        // Deliver whatever arrived before the signal.
        self.server.dispatch_events(&mut handlers);
        self.flush_outbox(&outbox);

        if let Err(e) = self.server.stop() {
            warn!("⚠️ Stop reported: {}", e);
        }
        self.log_stats();
        info!("✅ Echo server shut down");
        Ok(())
    }

    fn event_handlers(&self, outbox: Outbox) -> EventHandlers {
        let (on_connect, on_disconnect, on_error) = (
            Arc::clone(&self.stats),
            Arc::clone(&self.stats),
            Arc::clone(&self.stats),
        );

        EventHandlers::new()
            .on_client_connected(move |id| {
                on_connect.connected.fetch_add(1, Ordering::Relaxed);
                info!("🔗 Client {} connected", id);
            })
            .on_client_disconnected(move |id| {
                on_disconnect.disconnected.fetch_add(1, Ordering::Relaxed);
                info!("👋 Client {} disconnected", id);
            })
            .on_message_received(move |id, data| {
                debug!("📨 {} byte(s) from client {}", data.len(), id);
                if let Ok(mut pending) = outbox.lock() {
                    pending.push_back((id, data.to_vec()));
                }
            })
            .on_error(move |id, message| {
                on_error.errors.fetch_add(1, Ordering::Relaxed);
                warn!("❌ Error on connection {}: {}", id, message);
            })
    }

    fn flush_outbox(&mut self, outbox: &Outbox) {
        let pending: Vec<_> = match outbox.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };

        for (id, data) in pending {
            let result = match Reply::for_payload(&data) {
                Reply::Text(text) => self.server.send_text(id, text),
                Reply::Binary(bytes) => self.server.send(id, bytes),
            };
            match result {
                Ok(()) => {
                    self.stats.echoed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => debug!("Echo to client {} dropped: {}", id, e),
            }
        }
    }

    fn log_stats(&self) {
        info!(
            "📊 {} | open: {} | connected: {} | disconnected: {} | echoed: {} | errors: {}",
            self.server.info(),
            self.server.connection_count(),
            self.stats.connected.load(Ordering::Relaxed),
            self.stats.disconnected.load(Ordering::Relaxed),
            self.stats.echoed.load(Ordering::Relaxed),
            self.stats.errors.load(Ordering::Relaxed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_payloads_echo_as_text() {
        assert_eq!(Reply::for_payload(b"hello"), Reply::Text("hello"));
        assert_eq!(Reply::for_payload(b""), Reply::Text(""));
    }

    #[test]
    fn test_other_payloads_echo_as_binary() {
        let data = [0xff, 0xfe, 0x00];
        assert_eq!(Reply::for_payload(&data), Reply::Binary(&data));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.server.tick_interval_ms = 0;
        assert!(Application::new(config).is_err());
    }

    #[tokio::test]
    async fn test_outbox_echoes_to_connected_client() {
        use std::time::Instant;
        use tokio_tungstenite::tungstenite::{self, Message};

        let mut config = AppConfig::default();
        config.server.port = 0;
        let mut app = Application::new(config).expect("application");
        app.server.start().expect("start");
        let port = app.server.port();

        let client = tokio::task::spawn_blocking(move || {
            let (mut socket, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).expect("connect");
            socket.send(Message::Text("echo me".into())).expect("send");
            socket.read().expect("reply")
        });

        let outbox: Outbox = Arc::new(Mutex::new(VecDeque::new()));
        let mut handlers = app.event_handlers(Arc::clone(&outbox));
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.stats.echoed.load(Ordering::Relaxed) == 0 {
            assert!(Instant::now() < deadline, "no echo within deadline");
            app.server.dispatch_events(&mut handlers);
            app.flush_outbox(&outbox);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let reply = client.await.expect("client task");
        assert_eq!(reply, Message::Text("echo me".into()));
        assert_eq!(app.stats.connected.load(Ordering::Relaxed), 1);
    }
}
