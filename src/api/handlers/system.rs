//! System endpoints: health check, registry statistics, demo page.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::RegistryStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /api/v1/stats` — Registry statistics.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "System",
    summary = "Registry statistics",
    description = "Returns the number of owners, channels, and live connections in the registry.",
    responses(
        (status = 200, description = "Current registry counters", body = RegistryStats),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.registry.stats().await))
}

/// `GET /` — Embedded demo page exercising the WebSocket relay.
pub async fn demo_handler() -> impl IntoResponse {
    Html(include_str!("../../../assets/demo.html"))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(demo_handler))
        .route("/health", get(health_handler))
}
