//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections: id assignment,
//! tracking, outbound message queuing and server-initiated closure.

pub mod client;
pub mod manager;

pub use client::ClientConnection;
pub use manager::ConnectionManager;
