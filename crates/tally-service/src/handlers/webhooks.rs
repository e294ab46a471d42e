//! Payment provider webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::payload::RawWebhookRequest;
use crate::state::AppState;

/// Webhook acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Whether the webhook was received.
    pub received: bool,
}

/// Handle provider webhooks.
///
/// Verification runs on the untouched body before anything parses it. Once
/// an event is verified the provider is always acknowledged: store failures
/// are logged for operators rather than surfaced, so a transient fault here
/// does not turn into a redelivery storm.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    request: RawWebhookRequest,
) -> Result<Json<WebhookResponse>, ApiError> {
    if !request.is_json() {
        tracing::debug!(
            content_type = ?request.content_type,
            "Webhook body not declared as JSON"
        );
    }

    let event = state
        .verifier
        .verify(&request.body, request.signature.as_deref())
        .map_err(|e| {
            tracing::warn!(error = %e, "Webhook signature verification failed");
            e
        })?;

    tracing::info!(
        event_id = ?event.id(),
        event_type = %event.kind(),
        "Received verified webhook"
    );

    let outcome = state.dispatcher.dispatch(&state.store, &event).await;
    tracing::debug!(outcome = ?outcome, "Webhook dispatched");

    Ok(Json(WebhookResponse { received: true }))
}
