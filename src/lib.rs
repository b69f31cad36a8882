//! # relay-gateway
//!
//! WebSocket relay gateway for directed and broadcast real-time
//! messaging.
//!
//! Clients connect over WebSocket identified by an owner identity and a
//! channel key. The gateway tracks every live connection in an
//! in-memory registry and routes opaque payloads either to a specific
//! (owner, key) pair or to every owner under a key.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)      broadcast, directed send, stats
//!     ├── WS Handler (ws/)          register, relay, terminate
//!     │
//!     └── ConnectionRegistry (domain/)
//!         owner → key → registrations
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ws;
