//! WebSocket layer: upgrade handling, per-connection tasks, relay envelope.
//!
//! The WebSocket endpoint at `/ws` registers each connection in the
//! [`crate::domain::ConnectionRegistry`] under the owner and key named
//! in the upgrade request's query parameters.

pub mod connection;
pub mod handler;
pub mod messages;
