//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::ConnectionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The process-wide connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Capacity of each connection's outbound frame queue.
    pub outbound_queue_depth: usize,
}
