//! API error types and responses.
//!
//! The two public failure shapes are fixed by the callers: the payment
//! provider gets `400 Webhook Error: <reason>` as plain text, and browsers
//! asking for a checkout session get a generic JSON 500 with no internals.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::signature::SignatureError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Webhook failed verification.
    #[error("{0}")]
    InvalidSignature(#[from] SignatureError),

    /// The checkout session could not be created.
    #[error("failed to create checkout session")]
    SessionCreationFailed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidSignature(reason) => (
                StatusCode::BAD_REQUEST,
                format!("Webhook Error: {reason}"),
            )
                .into_response(),
            Self::SessionCreationFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to create session" })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn invalid_signature_is_plain_400() {
        let (status, body) = render(SignatureError::SignatureMismatch.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            "Webhook Error: No signatures found matching the expected signature for payload"
        );
    }

    #[tokio::test]
    async fn session_failure_is_generic_500() {
        let (status, body) = render(ApiError::SessionCreationFailed).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Failed to create session"}"#);
    }
}
