//! Relay envelope convention for WebSocket clients.
//!
//! The registry itself forwards opaque payloads; this envelope is the
//! convention enforced by the WebSocket collaborator for directed
//! relay between connections. Inbound frames name a recipient owner,
//! relayed frames are stamped with the sender's identity instead.

use serde::{Deserialize, Serialize};

/// Client → Gateway: relay `message` to `recipient` under the same key.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    /// Opaque message body, forwarded verbatim.
    pub message: serde_json::Value,
    /// Owner identity to deliver to.
    pub recipient: String,
}

/// Gateway → Client: a relayed message from another connection.
#[derive(Debug, Clone, Serialize)]
pub struct RelayDelivery {
    /// Opaque message body, forwarded verbatim.
    pub message: serde_json::Value,
    /// Owner identity of the sending connection.
    pub from: String,
}
