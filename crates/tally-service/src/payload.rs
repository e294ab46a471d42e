//! Raw webhook payload capture.
//!
//! Signatures are computed over the body bytes exactly as the provider sent
//! them, so the webhook route must never see a decoded-and-re-encoded body.
//! [`RawWebhookRequest`] is the only extractor the webhook handler uses: it
//! buffers the body as [`Bytes`] and copies out the two headers verification
//! needs. No JSON extractor or body-rewriting layer sits in front of it, so
//! the capture holds regardless of how other routes are registered.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;

use crate::signature::SIGNATURE_HEADER;

/// An inbound webhook with its body untouched.
#[derive(Debug, Clone)]
pub struct RawWebhookRequest {
    /// Value of the signature header, if present and valid UTF-8.
    pub signature: Option<String>,
    /// The request body as transmitted.
    pub body: Bytes,
    /// Declared content type, if any.
    pub content_type: Option<String>,
}

impl RawWebhookRequest {
    /// Whether the sender declared a JSON body.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }
}

#[async_trait]
impl<S> FromRequest<S> for RawWebhookRequest
where
    S: Send + Sync,
{
    type Rejection = BytesRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (signature, content_type) = {
            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            (header(SIGNATURE_HEADER), header(CONTENT_TYPE.as_str()))
        };

        let body = Bytes::from_request(req, state).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read webhook body");
            e
        })?;

        Ok(Self {
            signature,
            body,
            content_type,
        })
    }
}
