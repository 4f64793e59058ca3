//! # Dwebble RWS - WebSocket Engine
//!
//! The network engine behind the Dwebble server facade. It owns everything that
//! touches a socket: accepting TCP connections, optional TLS termination, the
//! WebSocket upgrade with subprotocol negotiation, framing, and the event queue
//! a host drains on its own schedule.
//!
//! ## Architecture Overview
//!
//! * **Server** - One engine-side instance with a dedicated tokio runtime
//! * **Connection Manager** - Registry of upgraded connections and their writer queues
//! * **Event Queue** - Unbounded MPSC queue; connection tasks produce, `poll` consumes
//! * **Engine Boundary** - The [`EngineBoundary`] trait a facade is written against
//! * **C ABI** - `dwebble_rws_*` exports for hosts loading the engine dynamically
//!
//! ## Ordering
//!
//! Every event for a connection is produced by that connection's task, in
//! order, on one queue. A `CLIENT_DISCONNECTED` is therefore never observed
//! before the `MESSAGE_RECEIVED` events that preceded it.
//!
//! ## Threading
//!
//! No method blocks on network I/O. The engine never calls `block_on`, so a
//! server can be created, driven and dropped from inside another runtime.
//!
//! ```rust,no_run
//! use dwebble_rws::{EngineBoundary, EngineConfig, RwsEngine, StatusCode};
//!
//! let engine = RwsEngine;
//! let mut server = engine.create(&EngineConfig::default()).expect("runtime");
//! assert_eq!(engine.start(&mut server), StatusCode::OK);
//! while let Some(event) = engine.poll(&mut server) {
//!     println!("{:?}", event);
//! }
//! engine.destroy(server);
//! ```

pub use boundary::{EngineBoundary, RwsEngine};
pub use error::EngineError;
pub use server::Server;
pub use types::{ConnectionId, EngineConfig, EngineEvent, EventCode, StatusCode};

pub mod boundary;
pub mod connection;
pub mod error;
pub mod ffi;
pub mod server;
pub mod tls;
pub mod types;

#[cfg(test)]
mod tests;
