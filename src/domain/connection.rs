//! Transport handles and opaque payloads.
//!
//! The registry never touches a socket directly. Each connection is
//! represented by a [`ConnectionHandle`]: the sending half of a bounded
//! queue drained by the connection's writer task. Every queued frame
//! carries a oneshot acknowledgement, so [`ConnectionHandle::send`]
//! completes only once the underlying write finished or failed.

use tokio::sync::{mpsc, oneshot};

/// Opaque message body forwarded by the registry.
///
/// The registry never inspects payload contents; any structure (relay
/// envelopes, JSON bodies) is a convention between collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Raw binary frame.
    Binary(Vec<u8>),
}

/// Failure of a single per-connection send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The connection's writer task is gone; the frame was never written.
    #[error("connection closed")]
    Closed,

    /// The transport write itself failed.
    #[error("transport write failed: {0}")]
    Transport(String),
}

/// One outbound frame queued toward a connection's writer task.
///
/// The writer task must answer `ack` with the outcome of the actual
/// socket write. Dropping `ack` without answering is reported to the
/// sender as [`SendError::Closed`].
#[derive(Debug)]
pub struct OutboundFrame {
    /// The payload to write.
    pub payload: Payload,
    /// Completion acknowledgement back to the `send` caller.
    pub ack: oneshot::Sender<Result<(), SendError>>,
}

/// Sending reference to one live connection.
///
/// Cheap to clone; the registry stores one per registration and clones
/// it when snapshotting a bucket for fan-out. The underlying socket is
/// owned by the connection's writer task, not by this handle.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    /// Creates a handle and the frame receiver its writer task drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Sends one payload and waits for the writer task's acknowledgement.
    ///
    /// Suspends until the frame has been written to the socket (or the
    /// write failed). A slow connection therefore delays its own sender
    /// without affecting sends to other connections.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the writer task has terminated,
    /// or the [`SendError`] the writer task reported for this frame.
    pub async fn send(&self, payload: Payload) -> Result<(), SendError> {
        let (ack, ack_rx) = oneshot::channel();
        self.tx
            .send(OutboundFrame { payload, ack })
            .await
            .map_err(|_| SendError::Closed)?;
        ack_rx.await.map_err(|_| SendError::Closed)?
    }
}
