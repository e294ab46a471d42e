//! Checkout session handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::StripeError;

/// Response body for `POST /create-checkout-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    /// Where to send the browser.
    pub url: String,
}

/// Mint an access token and open a checkout session that returns to
/// `<frontend>/success?token=<id>`.
///
/// Failures are logged in full and reported to the browser as a generic 500.
pub async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Some(stripe) = &state.stripe else {
        tracing::error!("Checkout requested but Stripe is not configured");
        return Err(ApiError::SessionCreationFailed);
    };

    let token = state.store.issue_access_token().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to persist access token");
        ApiError::SessionCreationFailed
    })?;

    let frontend = state.config.frontend_url.trim_end_matches('/');
    let success_url = format!("{frontend}/success?token={}", token.id);
    let cancel_url = format!("{frontend}/cancel");

    let session = stripe
        .create_checkout_session(&state.config.checkout, &token.id, &success_url, &cancel_url)
        .await
        .and_then(|session| {
            let url = session
                .url
                .clone()
                .ok_or_else(|| StripeError::MissingUrl(session.id.clone()))?;
            Ok((session.id, url))
        });

    match session {
        Ok((session_id, url)) => {
            tracing::info!(
                token_id = %token.id,
                session_id = %session_id,
                "Checkout session created"
            );
            Ok(Json(CheckoutResponse { url }))
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                token_id = %token.id,
                "Failed to create checkout session"
            );
            Err(ApiError::SessionCreationFailed)
        }
    }
}
