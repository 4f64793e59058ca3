//! Loopback tests against a real engine instance.
//!
//! Clients are blocking `tungstenite` sockets; the server runs on its own
//! runtime, so these are plain `#[test]`s.

use crate::*;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::stream::MaybeTlsStream;
use tokio_tungstenite::tungstenite::{self, Message, WebSocket};

type Client = WebSocket<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn started_server(config: EngineConfig) -> Server {
    let server = Server::new(config).expect("engine runtime");
    assert_eq!(server.start(), StatusCode::OK);
    server
}

fn connect(port: u16) -> Client {
    let (client, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).expect("client connects");
    if let MaybeTlsStream::Plain(stream) = client.get_ref() {
        stream.set_read_timeout(Some(WAIT)).expect("read timeout");
    }
    client
}

/// Polls until an event arrives or the deadline passes.
fn next_event(server: &Server) -> EngineEvent {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(event) = server.poll_event() {
            return event;
        }
        assert!(Instant::now() < deadline, "timed out waiting for an engine event");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn expect_connected(server: &Server) -> ConnectionId {
    let event = next_event(server);
    assert_eq!(event.code, EventCode::CLIENT_CONNECTED);
    assert_ne!(event.connection_id, 0);
    event.connection_id
}

#[test]
fn test_ephemeral_port_is_reported_after_start() {
    let server = started_server(EngineConfig::default());
    let port = server.port();
    assert_ne!(port, 0);
    assert_eq!(server.info(), format!("127.0.0.1:{port}"));
    assert!(server.is_running());

    assert_eq!(server.stop(), StatusCode::OK);
    assert_eq!(server.port(), 0);
    assert!(!server.is_running());
    assert_eq!(server.stop(), StatusCode::NOT_RUNNING);
}

#[test]
fn test_messages_flow_both_ways_in_order() {
    let server = started_server(EngineConfig::default());
    let mut client = connect(server.port());
    let id = expect_connected(&server);
    assert_eq!(server.connection_count(), 1);

    client.send(Message::Binary(vec![1, 2, 3].into())).expect("send binary");
    client.send(Message::Text("hello".into())).expect("send text");
    client.send(Message::Binary(Vec::new().into())).expect("send empty");

    let first = next_event(&server);
    assert_eq!(first.code, EventCode::MESSAGE_RECEIVED);
    assert_eq!(first.connection_id, id);
    assert_eq!(first.data.as_deref(), Some(&[1u8, 2, 3][..]));

    let second = next_event(&server);
    assert_eq!(second.data.as_deref(), Some(&b"hello"[..]));

    let third = next_event(&server);
    assert_eq!(third.code, EventCode::MESSAGE_RECEIVED);
    assert_eq!(third.data, Some(Vec::new()));

    assert_eq!(server.send_text(id, "pong"), StatusCode::OK);
    assert_eq!(server.send(id, &[9, 8]), StatusCode::OK);
    assert_eq!(client.read().expect("text reply"), Message::Text("pong".into()));
    assert_eq!(client.read().expect("binary reply"), Message::Binary(vec![9, 8].into()));

    client.close(None).expect("client close");
    let _ = client.flush();

    let closed = next_event(&server);
    assert_eq!(closed.code, EventCode::CLIENT_DISCONNECTED);
    assert_eq!(closed.connection_id, id);
    assert_eq!(server.connection_count(), 0);
    assert_eq!(server.send(id, &[1]), StatusCode::INVALID_HANDLE);
}

#[test]
fn test_server_side_disconnect_closes_the_client() {
    let server = started_server(EngineConfig::default());
    let mut client = connect(server.port());
    let id = expect_connected(&server);

    assert_eq!(server.disconnect(id), StatusCode::OK);
    assert_eq!(server.disconnect(id), StatusCode::INVALID_HANDLE);
    assert!(matches!(client.read(), Ok(Message::Close(_))));

    let event = next_event(&server);
    assert_eq!(event.code, EventCode::CLIENT_DISCONNECTED);
    assert_eq!(event.connection_id, id);
}

/// Performs the upgrade over a bare socket and returns it without ever
/// reading again, so close frames from the server go unanswered.
fn upgrade_silent_peer(port: u16) -> TcpStream {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("tcp connect");
    stream.set_read_timeout(Some(WAIT)).expect("read timeout");
    let request = format!(
        "GET / HTTP/1.1\r\n\
         Host: 127.0.0.1:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).expect("write upgrade");

    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).expect("read upgrade response");
        response.push(byte[0]);
    }
    assert!(response.starts_with(b"HTTP/1.1 101"), "upgrade was not accepted");
    stream
}

#[test]
fn test_disconnect_completes_when_peer_never_answers_close() {
    let server = started_server(EngineConfig::default());
    let _peer = upgrade_silent_peer(server.port());
    let id = expect_connected(&server);

    assert_eq!(server.disconnect(id), StatusCode::OK);

    let event = next_event(&server);
    assert_eq!(event.code, EventCode::CLIENT_DISCONNECTED);
    assert_eq!(event.connection_id, id);
    assert_eq!(server.connection_count(), 0);
    assert_eq!(server.send(id, &[1]), StatusCode::INVALID_HANDLE);
}

#[test]
fn test_stop_disconnects_everyone_and_restart_works() {
    let server = started_server(EngineConfig::default());
    let _a = connect(server.port());
    let _b = connect(server.port());
    let first = expect_connected(&server);
    let second = expect_connected(&server);
    assert_ne!(first, second);

    assert_eq!(server.stop(), StatusCode::OK);
    assert_eq!(server.connection_count(), 0);

    let mut disconnected = vec![next_event(&server), next_event(&server)];
    disconnected.sort_by_key(|e| e.connection_id);
    assert!(disconnected.iter().all(|e| e.code == EventCode::CLIENT_DISCONNECTED));

    assert_eq!(server.start(), StatusCode::OK);
    assert_ne!(server.port(), 0);
    let _c = connect(server.port());
    let third = expect_connected(&server);
    assert!(third > second);
}

#[test]
fn test_negotiates_first_supported_subprotocol() {
    let server = started_server(EngineConfig {
        subprotocols: Some("json, chat".to_string()),
        ..EngineConfig::default()
    });

    let mut request = format!("ws://127.0.0.1:{}", server.port())
        .into_client_request()
        .expect("valid request");
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("xml, chat"));

    let (_client, response) = tungstenite::connect(request).expect("client connects");
    assert_eq!(
        response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok()),
        Some("chat")
    );
}

#[test]
fn test_second_server_on_same_port_fails_to_bind() {
    let first = started_server(EngineConfig::default());
    let second = Server::new(EngineConfig {
        port: first.port(),
        ..EngineConfig::default()
    })
    .expect("engine runtime");

    assert_eq!(second.start(), StatusCode::BIND_FAILED);
    assert!(!second.is_running());
}

#[test]
fn test_tls_configuration_errors() {
    let one_path = Server::new(EngineConfig {
        tls_key_path: Some("key.pem".to_string()),
        ..EngineConfig::default()
    })
    .expect("engine runtime");
    assert_eq!(one_path.start(), StatusCode::INVALID_PARAM);

    let empty_paths = Server::new(EngineConfig {
        tls_cert_path: Some(String::new()),
        tls_key_path: Some(String::new()),
        ..EngineConfig::default()
    })
    .expect("engine runtime");
    assert_eq!(empty_paths.start(), StatusCode::TLS_ERROR);
    assert_eq!(empty_paths.port(), 0);
}

#[test]
fn test_starts_with_generated_certificate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("generate certificate");
    let cert = dir.path().join("cert.pem");
    let key = dir.path().join("key.pem");
    std::fs::write(&cert, generated.cert.pem()).expect("write cert");
    std::fs::write(&key, generated.key_pair.serialize_pem()).expect("write key");

    let server = started_server(EngineConfig {
        tls_cert_path: Some(cert.to_string_lossy().into_owned()),
        tls_key_path: Some(key.to_string_lossy().into_owned()),
        ..EngineConfig::default()
    });
    assert_ne!(server.port(), 0);
}

#[test]
fn test_boundary_trait_drives_the_server() {
    let engine = RwsEngine;
    let mut handle = engine.create(&EngineConfig::default()).expect("handle");
    assert_eq!(engine.stop(&mut handle), StatusCode::NOT_RUNNING);
    assert_eq!(engine.start(&mut handle), StatusCode::OK);
    assert_eq!(engine.start(&mut handle), StatusCode::ALREADY_RUNNING);
    assert_ne!(engine.port(&handle), 0);
    assert!(engine.poll(&mut handle).is_none());
    assert_eq!(engine.send_text(&mut handle, 3, "x"), StatusCode::INVALID_HANDLE);
    engine.destroy(handle);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_inside_a_runtime_does_not_panic() {
    let server = started_server(EngineConfig::default());
    assert_ne!(server.port(), 0);
    drop(server);
}
