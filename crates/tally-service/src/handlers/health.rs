//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Static acknowledgment served at `/`.
pub const LIVENESS_MESSAGE: &str = "Stripe webhook backend is live!";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Whether checkout sessions can be created.
    pub checkout_enabled: bool,
}

/// Liveness probe.
pub async fn root() -> &'static str {
    LIVENESS_MESSAGE
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "tally".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checkout_enabled: state.has_stripe(),
    })
}
