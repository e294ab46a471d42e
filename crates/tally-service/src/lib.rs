//! Tally HTTP API Service.
//!
//! This crate provides the HTTP API for tally:
//!
//! - Signed payment webhooks that increment persistent counters
//! - Checkout sessions carrying freshly minted access tokens
//! - Liveness and health checks
//!
//! # Webhook pipeline
//!
//! 1. [`payload::RawWebhookRequest`] captures the body bytes untouched
//! 2. [`signature::SignatureVerifier`] checks the HMAC and timestamp
//! 3. [`dispatch::EventDispatcher`] maps the event type to a counter
//! 4. [`store_client::StoreClient`] applies the increment atomically
//!
//! Only step 2 can reject a webhook.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers must be async for Axum

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod payload;
pub mod routes;
pub mod signature;
pub mod state;
pub mod store_client;
pub mod stripe;

pub use config::{ConfigError, ServiceConfig};
pub use dispatch::{CounterRoutes, EventDispatcher, Outcome};
pub use error::ApiError;
pub use routes::create_router;
pub use signature::{SignatureError, SignatureVerifier, VerifiedEvent};
pub use state::AppState;
pub use store_client::{StoreClient, StoreFailure};
pub use stripe::{StripeClient, StripeError};
