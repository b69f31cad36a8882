//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::{ChannelKey, OwnerId};
use crate::error::GatewayError;

/// Identifiers supplied by the client on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Owner identity to register under.
    #[serde(default)]
    pub owner: String,
    /// Channel key to register under.
    #[serde(default)]
    pub key: String,
}

/// `GET /ws?owner=<owner>&key=<key>` — Upgrade to WebSocket.
///
/// Rejects missing or empty identifiers with 400 before upgrading.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentifier`] if `owner` or `key` is
/// empty or absent.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let owner = OwnerId::new(params.owner)?;
    let key = ChannelKey::new(params.key)?;
    let registry = Arc::clone(&state.registry);
    let depth = state.outbound_queue_depth;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, owner, key, registry, depth)))
}
