//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use tally_core::TokenId;

use super::types::{CheckoutSession, StripeErrorResponse};

/// Stripe API base URL.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Stripe answered without a redirect URL.
    #[error("checkout session {0} has no url")]
    MissingUrl(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// What a checkout session sells.
///
/// With `price_id` set the session references a catalogue price; otherwise
/// an inline price is built from the amount, currency and product name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Catalogue price (`price_...`).
    pub price_id: Option<String>,
    /// Inline unit amount in the currency's minor unit.
    pub amount_cents: i64,
    /// ISO currency code, lowercase.
    pub currency: String,
    /// Inline product name.
    pub product_name: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            price_id: None,
            amount_cents: 500,
            currency: "usd".into(),
            product_name: "Access pass".into(),
        }
    }
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: STRIPE_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API base (e.g. a local mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a Checkout session carrying an access token.
    ///
    /// The token is recorded in the session metadata so the session can be
    /// traced back to it from the dashboard.
    ///
    /// # Arguments
    ///
    /// * `checkout` - What is being sold
    /// * `access_token` - Token minted for this checkout
    /// * `success_url` - URL to redirect on success
    /// * `cancel_url` - URL to redirect on cancel
    pub async fn create_checkout_session(
        &self,
        checkout: &CheckoutConfig,
        access_token: &TokenId,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let mut params = vec![
            ("mode", "payment".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[access_token]", access_token.to_string()),
        ];

        if let Some(price_id) = &checkout.price_id {
            params.push(("line_items[0][price]", price_id.clone()));
        } else {
            params.extend([
                (
                    "line_items[0][price_data][currency]",
                    checkout.currency.clone(),
                ),
                (
                    "line_items[0][price_data][product_data][name]",
                    checkout.product_name.clone(),
                ),
                (
                    "line_items[0][price_data][unit_amount]",
                    checkout.amount_cents.to_string(),
                ),
            ]);
        }

        tracing::debug!(
            token_id = %access_token,
            price_id = ?checkout.price_id,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}
