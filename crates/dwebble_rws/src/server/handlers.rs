//! Connection handling logic for WebSocket clients.
//!
//! This module contains the per-connection task: optional TLS termination,
//! the WebSocket upgrade with subprotocol negotiation, and the read/write
//! loops that feed the engine's event queue.

use crate::{
    connection::ConnectionManager,
    error::EngineError,
    types::{ConnectionId, EngineEvent},
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace};

const PROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// How long a finished connection waits for its writer to flush the close frame.
const WRITER_LINGER: Duration = Duration::from_millis(500);

/// How long a server-closed connection waits for the peer's close reply.
const CLOSE_LINGER: Duration = Duration::from_millis(500);

/// Upper bound on the TLS handshake plus the WebSocket upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state every connection task needs.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub connection_manager: Arc<ConnectionManager>,
    pub events: mpsc::UnboundedSender<EngineEvent>,
    pub subprotocols: Arc<[String]>,
    pub tls: Option<TlsAcceptor>,
}

impl ConnectionContext {
    fn emit(&self, event: EngineEvent) {
        // The receiver lives as long as the server handle; a send failure only
        // means the handle is being torn down.
        let _ = self.events.send(event);
    }
}

/// Handles a single client connection from accept to cleanup.
///
/// # Connection Flow
///
/// 1. Terminate TLS when an acceptor is configured
/// 2. Perform the WebSocket handshake and pick a subprotocol
/// 3. Register the connection and emit `ClientConnected`
/// 4. Run the writer task and the read loop until either side closes,
///    the connection is kicked, or the server shuts down
/// 5. Unregister and emit `ClientDisconnected`
pub(crate) async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: ConnectionContext,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), EngineError> {
    match ctx.tls.clone() {
        Some(acceptor) => {
            let tls_stream = timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream))
                .await
                .map_err(|_| EngineError::Handshake(format!("TLS handshake with {addr} timed out")))?
                .map_err(|e| EngineError::Handshake(format!("TLS handshake with {addr} failed: {e}")))?;
            handle_websocket(tls_stream, addr, ctx, shutdown).await
        }
        None => handle_websocket(stream, addr, ctx, shutdown).await,
    }
}

async fn handle_websocket<S>(
    stream: S,
    addr: SocketAddr,
    ctx: ConnectionContext,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), EngineError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut selected_protocol: Option<String> = None;
    let supported = Arc::clone(&ctx.subprotocols);

    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        if let Some(protocol) = negotiate_subprotocol(request, &supported) {
            if let Ok(value) = HeaderValue::from_str(&protocol) {
                response.headers_mut().insert(PROTOCOL_HEADER, value);
                selected_protocol = Some(protocol);
            }
        }
        Ok(response)
    };

    let ws_stream = timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_hdr_async(stream, callback))
        .await
        .map_err(|_| EngineError::Handshake(format!("WebSocket handshake with {addr} timed out")))?
        .map_err(|e| EngineError::Handshake(format!("WebSocket handshake with {addr} failed: {e}")))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
    let closing = Arc::new(Notify::new());

    let connection_id = ctx
        .connection_manager
        .add_connection(addr, outgoing_tx.clone(), Arc::clone(&closing));
    ctx.emit(EngineEvent::connected(connection_id));
    debug!(
        "🤝 Client {} upgraded as connection {} (subprotocol: {:?})",
        addr, connection_id, selected_protocol
    );

    // Outgoing frames; a close frame is the last thing the writer sends
    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if let Err(e) = ws_sender.send(message).await {
                trace!("Writer for connection {} stopped: {}", connection_id, e);
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("🛑 Connection {} closing for server shutdown", connection_id);
                break;
            }
            _ = closing.notified() => {
                debug!("👢 Connection {} closed by server, awaiting peer close", connection_id);
                await_peer_close(&mut ws_receiver, connection_id).await;
                break;
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Binary(data))) => {
                    ctx.emit(EngineEvent::message(connection_id, data.to_vec()));
                }
                Some(Ok(Message::Text(text))) => {
                    ctx.emit(EngineEvent::message(connection_id, text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = outgoing_tx.send(Message::Pong(data));
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("🔌 Client {} requested close", connection_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error for connection {}: {}", connection_id, e);
                    ctx.emit(EngineEvent::error(connection_id, e.to_string()));
                    break;
                }
            }
        }
    }

    finish_connection(&ctx, connection_id, outgoing_tx, writer).await;
    info!("👋 Client {} disconnected (id: {})", addr, connection_id);
    Ok(())
}

/// Reads until the peer answers the server's close frame, the stream ends, or
/// [`CLOSE_LINGER`] passes. Frames arriving in the meantime are discarded.
async fn await_peer_close<R>(ws_receiver: &mut R, connection_id: ConnectionId)
where
    R: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let drained = timeout(CLOSE_LINGER, async {
        while let Some(Ok(message)) = ws_receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    })
    .await;

    if drained.is_err() {
        trace!("Peer of connection {} never answered the close frame", connection_id);
    }
}

/// Unregisters the connection, lets the writer flush, and reports the disconnect.
///
/// `ClientDisconnected` is queued strictly after every message event this task
/// produced.
async fn finish_connection(
    ctx: &ConnectionContext,
    connection_id: ConnectionId,
    outgoing_tx: mpsc::UnboundedSender<Message>,
    mut writer: tokio::task::JoinHandle<()>,
) {
    ctx.connection_manager.remove_connection(connection_id);
    drop(outgoing_tx);

    if timeout(WRITER_LINGER, &mut writer).await.is_err() {
        trace!("Writer for connection {} did not finish in time", connection_id);
        writer.abort();
    }

    ctx.emit(EngineEvent::disconnected(connection_id));
}

/// Picks the first protocol the client offered that the server supports.
fn negotiate_subprotocol(request: &Request, supported: &[String]) -> Option<String> {
    if supported.is_empty() {
        return None;
    }

    request
        .headers()
        .get_all(PROTOCOL_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .find(|requested| supported.iter().any(|s| s == requested))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(protocols: &[&str]) -> Request {
        let mut builder = Request::builder().uri("ws://localhost/");
        for protocol in protocols {
            builder = builder.header(PROTOCOL_HEADER, *protocol);
        }
        builder.body(()).expect("valid request")
    }

    #[test]
    fn test_negotiation_prefers_client_order() {
        let supported = vec!["json".to_string(), "chat".to_string()];
        let request = request_with(&["chat, json"]);
        assert_eq!(negotiate_subprotocol(&request, &supported).as_deref(), Some("chat"));
    }

    #[test]
    fn test_negotiation_without_overlap_selects_nothing() {
        let supported = vec!["json".to_string()];
        assert_eq!(negotiate_subprotocol(&request_with(&["xml"]), &supported), None);
        assert_eq!(negotiate_subprotocol(&request_with(&[]), &supported), None);
    }

    #[test]
    fn test_negotiation_is_disabled_without_supported_protocols() {
        assert_eq!(negotiate_subprotocol(&request_with(&["chat"]), &[]), None);
    }

    #[test]
    fn test_negotiation_reads_repeated_headers() {
        let supported = vec!["v2".to_string()];
        let request = request_with(&["v1", "v2"]);
        assert_eq!(negotiate_subprotocol(&request, &supported).as_deref(), Some("v2"));
    }
}
