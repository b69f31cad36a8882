//! Per-connection WebSocket task.
//!
//! Each accepted socket is split into a writer task that drains the
//! connection's outbound frame queue and a read loop that dispatches
//! inbound frames through the registry. Close, read error, and EOF all
//! funnel into the same deregistration call, which is idempotent.

use std::sync::{Arc, Weak};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use super::messages::{RelayDelivery, RelayRequest};
use crate::domain::{
    ChannelKey, ConnectionHandle, ConnectionRegistry, InboundHandler, OutboundFrame, OwnerId,
    Payload, SendError,
};

/// Runs one WebSocket connection from registration to removal.
///
/// Registers the connection under (owner, key) with the directed-relay
/// inbound handler, then reads frames until the socket terminates.
pub async fn run_connection(
    socket: WebSocket,
    owner: OwnerId,
    key: ChannelKey,
    registry: Arc<ConnectionRegistry>,
    outbound_queue_depth: usize,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (handle, outbound_rx) = ConnectionHandle::channel(outbound_queue_depth);

    let on_data = relay_handler(Arc::downgrade(&registry), owner.clone(), key.clone());
    let id = registry
        .register(owner.clone(), key.clone(), handle, Some(on_data))
        .await;
    tracing::debug!(%owner, %key, registration = %id, "ws connection registered");

    let writer = tokio::spawn(write_loop(ws_tx, outbound_rx));

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let payload = Payload::Text(text.to_string());
                registry.dispatch_inbound(&owner, &key, id, &payload).await;
            }
            Ok(Message::Binary(bytes)) => {
                let payload = Payload::Binary(bytes.to_vec());
                registry.dispatch_inbound(&owner, &key, id, &payload).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong handled by axum
            Err(error) => {
                tracing::debug!(%owner, %key, %error, "ws read error");
                break;
            }
        }
    }

    // Close and error paths both land here; deregister is idempotent.
    registry.deregister(&owner, &key, id).await;
    writer.abort();
    tracing::debug!(%owner, %key, registration = %id, "ws connection closed");
}

/// Drains the outbound queue, performing the actual socket writes and
/// acknowledging each frame with the write's outcome.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: tokio::sync::mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let message = match frame.payload {
            Payload::Text(text) => Message::text(text),
            Payload::Binary(bytes) => Message::binary(bytes),
        };
        let result = ws_tx
            .send(message)
            .await
            .map_err(|e| SendError::Transport(e.to_string()));
        let failed = result.is_err();
        let _ = frame.ack.send(result);
        if failed {
            // The sink is unusable; pending senders see Closed.
            break;
        }
    }
}

/// Builds the directed-relay inbound handler for one connection.
///
/// Parses each inbound text frame as a [`RelayRequest`] and re-sends
/// the body to the recipient owner under the same key, stamped with the
/// sender's identity. Malformed envelopes are logged at debug level and
/// dropped; the registry is captured weakly so registrations never keep
/// it alive.
fn relay_handler(
    registry: Weak<ConnectionRegistry>,
    owner: OwnerId,
    key: ChannelKey,
) -> InboundHandler {
    Arc::new(move |payload| {
        let Payload::Text(text) = payload else {
            tracing::debug!(%owner, %key, "ignoring non-text inbound frame");
            return;
        };
        let request = match serde_json::from_str::<RelayRequest>(text) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(%owner, %key, %error, "malformed relay envelope");
                return;
            }
        };
        let Ok(recipient) = OwnerId::new(request.recipient) else {
            tracing::debug!(%owner, %key, "relay envelope with empty recipient");
            return;
        };
        let delivery = RelayDelivery {
            message: request.message,
            from: owner.to_string(),
        };
        let json = match serde_json::to_string(&delivery) {
            Ok(json) => json,
            Err(error) => {
                tracing::debug!(%owner, %key, %error, "relay delivery serialization failed");
                return;
            }
        };
        let Some(registry) = registry.upgrade() else {
            return;
        };
        let sender = owner.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let report = registry.send(&recipient, &key, Payload::Text(json)).await;
            if !report.is_complete() {
                tracing::warn!(
                    %sender,
                    %recipient,
                    %key,
                    attempted = report.attempted(),
                    delivered = report.delivered(),
                    "relay delivery incomplete"
                );
            }
        });
    })
}
