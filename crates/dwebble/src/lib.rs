//! # Dwebble - WebSocket Server Facade
//!
//! A small, handle-based management layer for running a WebSocket (optionally
//! TLS-secured) server from a host application that pumps work on its own
//! tick. The facade owns one opaque engine handle and adds:
//!
//! * **Lifecycle** - `start`/`stop` with local misuse detection and guaranteed
//!   handle release on drop
//! * **Configuration translation** - [`ServerConfig`] to the engine's flat shape
//! * **Connection addressing** - engine-issued [`ConnectionId`]s
//! * **Event delivery** - non-blocking [`WebSocketServer::poll_event`], or
//!   callbacks through [`EventHandlers`]
//! * **Error taxonomy** - every outcome normalized into [`ServerError`]
//!
//! Socket I/O, the WebSocket protocol and TLS all live behind the
//! [`EngineBoundary`] trait. [`WebSocketServer::new`] uses the bundled
//! [`RwsEngine`]; [`WebSocketServer::with_engine`] accepts any other.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dwebble::{EventHandlers, ServerConfig, WebSocketServer};
//!
//! let mut server = WebSocketServer::new(
//!     ServerConfig::new(9001).with_subprotocols(["chat"]),
//! );
//! server.start()?;
//!
//! let mut handlers = EventHandlers::new()
//!     .on_client_connected(|id| println!("client {id} connected"))
//!     .on_message_received(|id, data| println!("{id}: {} bytes", data.len()));
//!
//! // Call once per host tick
//! server.dispatch_events(&mut handlers);
//! # Ok::<(), dwebble::ServerError>(())
//! ```

pub use config::ServerConfig;
pub use dispatch::EventHandlers;
pub use error::{map_status, Result, ResultCode, ServerError};
pub use event::{ConnectionId, Event, EventKind};
pub use server::WebSocketServer;

pub use dwebble_rws::{EngineBoundary, EngineConfig, EngineEvent, EventCode, RwsEngine, StatusCode};

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod server;
