//! Server lifecycle and connection handling.
//!
//! This module contains the engine-side server object and the logic for
//! handling individual client connections.

pub mod core;
pub(crate) mod handlers;

pub use self::core::Server;
