//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{checkout, health, webhooks};
use crate::state::AppState;

/// Maximum concurrent checkout session requests.
/// Each one holds an outbound Stripe call open.
const CHECKOUT_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /` - Liveness acknowledgment
/// - `GET /health` - Health check
///
/// ## Checkout (rate-limited)
/// - `POST /create-checkout-session` - Mint an access token and start checkout
///
/// ## Webhooks (Signature verification)
/// - `POST /webhook` - Stripe webhooks, raw body only, outside the request
///   timeout
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let checkout_routes = Router::new()
        .route(
            "/create-checkout-session",
            post(checkout::create_checkout_session),
        )
        .layer(ConcurrencyLimitLayer::new(CHECKOUT_MAX_CONCURRENT_REQUESTS));

    // Bounded by the request timeout
    let timed_routes = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(checkout_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )));

    Router::new()
        // Webhooks (no rate limit - controlled by the provider). Bounded by
        // the store timeout instead: a verified event must always get a 200.
        .route("/webhook", post(webhooks::receive_webhook))
        .merge(timed_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
