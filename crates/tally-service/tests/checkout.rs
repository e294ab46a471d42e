//! Checkout session integration tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::TestHarness;
use tally_core::{AccessToken, CounterDocument, CounterId, TokenId};
use tally_store::{CounterStore, StoreError};

const SESSION_URL: &str = "https://checkout.stripe.com/c/pay/cs_test_1";

/// A store that cannot persist tokens.
struct ReadOnlyStore;

impl CounterStore for ReadOnlyStore {
    fn increment(&self, _counter: &CounterId) -> tally_store::Result<()> {
        Err(StoreError::Database("read only".into()))
    }

    fn increment_once(&self, _counter: &CounterId, _event_id: &str) -> tally_store::Result<()> {
        Err(StoreError::Database("read only".into()))
    }

    fn get_counter(&self, _counter: &CounterId) -> tally_store::Result<Option<CounterDocument>> {
        Ok(None)
    }

    fn has_processed_event(&self, _event_id: &str) -> tally_store::Result<bool> {
        Ok(false)
    }

    fn issue_access_token(&self) -> tally_store::Result<AccessToken> {
        Err(StoreError::Database("read only".into()))
    }

    fn get_access_token(&self, _id: &TokenId) -> tally_store::Result<Option<AccessToken>> {
        Ok(None)
    }
}

async fn mock_stripe(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn harness_for(stripe: &MockServer) -> TestHarness {
    let base = format!("{}/v1", stripe.uri());
    TestHarness::with_config(move |config| {
        config.stripe_api_key = Some("sk_test_xxx".into());
        config.stripe_api_base = base;
        config.frontend_url = "https://app.example.com/".into();
    })
}

/// Pull the access token out of each form body Stripe received.
async fn tokens_sent(stripe: &MockServer) -> Vec<TokenId> {
    stripe
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| {
            std::str::from_utf8(&request.body)
                .ok()?
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "metadata%5Baccess_token%5D")
                .and_then(|(_, value)| value.parse().ok())
        })
        .collect()
}

#[tokio::test]
async fn returns_session_url() {
    let stripe = mock_stripe(200, json!({ "id": "cs_test_1", "url": SESSION_URL })).await;
    let harness = harness_for(&stripe);

    let response = harness.server.post("/create-checkout-session").await;

    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>(), json!({ "url": SESSION_URL }));
}

#[tokio::test]
async fn each_session_gets_a_fresh_persisted_token() {
    let stripe = mock_stripe(200, json!({ "id": "cs_test_1", "url": SESSION_URL })).await;
    let harness = harness_for(&stripe);

    harness
        .server
        .post("/create-checkout-session")
        .await
        .assert_status_ok();
    harness
        .server
        .post("/create-checkout-session")
        .await
        .assert_status_ok();

    let tokens = tokens_sent(&stripe).await;
    assert_eq!(tokens.len(), 2);
    assert_ne!(tokens[0], tokens[1]);

    for token in &tokens {
        let stored = harness.store.get_access_token(token).unwrap();
        assert_eq!(stored.map(|t| t.id), Some(*token));
    }
}

#[tokio::test]
async fn success_url_carries_the_token() {
    let stripe = mock_stripe(200, json!({ "id": "cs_test_1", "url": SESSION_URL })).await;
    let harness = harness_for(&stripe);

    harness
        .server
        .post("/create-checkout-session")
        .await
        .assert_status_ok();

    let requests = stripe.received_requests().await.unwrap_or_default();
    let body = std::str::from_utf8(&requests[0].body).unwrap();
    let token = tokens_sent(&stripe).await[0];

    // Trailing slash on the frontend URL is not doubled
    assert!(body.contains(&format!(
        "success_url=https%3A%2F%2Fapp.example.com%2Fsuccess%3Ftoken%3D{token}"
    )));
    assert!(body.contains("cancel_url=https%3A%2F%2Fapp.example.com%2Fcancel"));
}

#[tokio::test]
async fn upstream_error_is_generic_500() {
    let stripe = mock_stripe(
        400,
        json!({
            "error": {
                "type": "invalid_request_error",
                "message": "No such price: 'price_missing'",
                "code": "resource_missing"
            }
        }),
    )
    .await;
    let harness = harness_for(&stripe);

    let response = harness.server.post("/create-checkout-session").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<serde_json::Value>(),
        json!({ "error": "Failed to create session" })
    );
    assert!(!response.text().contains("price_missing"));
}

#[tokio::test]
async fn session_without_url_is_500() {
    let stripe = mock_stripe(200, json!({ "id": "cs_test_1", "url": null })).await;
    let harness = harness_for(&stripe);

    let response = harness.server.post("/create-checkout-session").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unconfigured_stripe_is_500() {
    let harness = TestHarness::new();

    let response = harness.server.post("/create-checkout-session").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<serde_json::Value>(),
        json!({ "error": "Failed to create session" })
    );
}

#[tokio::test]
async fn token_persistence_failure_skips_stripe() {
    let stripe = mock_stripe(200, json!({ "id": "cs_test_1", "url": SESSION_URL })).await;
    let base = format!("{}/v1", stripe.uri());
    let harness = TestHarness::with_store(Arc::new(ReadOnlyStore), move |config| {
        config.stripe_api_key = Some("sk_test_xxx".into());
        config.stripe_api_base = base;
    });

    let response = harness.server.post("/create-checkout-session").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(tokens_sent(&stripe).await.is_empty());
}
