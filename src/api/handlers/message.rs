//! Broadcast and directed send endpoint handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{DeliveryResponse, SendMessageRequest};
use crate::app_state::AppState;
use crate::domain::{ChannelKey, OwnerId, Payload};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /channels/:key/broadcast` — Send to every owner under a key.
///
/// The payload reaches every connection registered under `key` across
/// all owners. Delivery is best-effort and non-atomic: the response
/// reports how many targets were attempted and how many succeeded.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentifier`] if `key` is empty and
/// [`GatewayError::Internal`] if the payload cannot be serialized.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{key}/broadcast",
    tag = "Messages",
    summary = "Broadcast a message",
    description = "Sends the message body to every connection registered under the key, across all owners.",
    params(
        ("key" = String, Path, description = "Channel key"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Fan-out finished", body = DeliveryResponse),
        (status = 400, description = "Empty channel key", body = ErrorResponse),
    )
)]
pub async fn broadcast_message(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let key = ChannelKey::new(key)?;
    let payload = encode_payload(&req)?;

    let report = state.registry.send_all(&key, payload).await;
    tracing::info!(
        %key,
        attempted = report.attempted(),
        delivered = report.delivered(),
        "broadcast"
    );
    Ok(Json(DeliveryResponse::from_report(
        key.to_string(),
        None,
        &report,
    )))
}

/// `POST /channels/:key/owners/:owner/send` — Directed send.
///
/// Targets only the connections registered under the exact
/// (owner, key) pair. Sending to an unknown pair is a no-op, not an
/// error.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentifier`] if `owner` or `key` is
/// empty and [`GatewayError::Internal`] if the payload cannot be
/// serialized.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{key}/owners/{owner}/send",
    tag = "Messages",
    summary = "Send a directed message",
    description = "Sends the message body to every connection registered under the exact (owner, key) pair.",
    params(
        ("key" = String, Path, description = "Channel key"),
        ("owner" = String, Path, description = "Target owner identity"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Fan-out finished", body = DeliveryResponse),
        (status = 400, description = "Empty owner or channel key", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path((key, owner)): Path<(String, String)>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let key = ChannelKey::new(key)?;
    let owner = OwnerId::new(owner)?;
    let payload = encode_payload(&req)?;

    let report = state.registry.send(&owner, &key, payload).await;
    tracing::info!(
        %owner,
        %key,
        attempted = report.attempted(),
        delivered = report.delivered(),
        "directed send"
    );
    Ok(Json(DeliveryResponse::from_report(
        key.to_string(),
        Some(owner.to_string()),
        &report,
    )))
}

/// Serializes the opaque message body into a text payload.
fn encode_payload(req: &SendMessageRequest) -> Result<Payload, GatewayError> {
    let json = serde_json::to_string(&req.message)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(Payload::Text(json))
}

/// Message routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels/{key}/broadcast", post(broadcast_message))
        .route("/channels/{key}/owners/{owner}/send", post(send_message))
}
