//! Common test utilities for tally integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestResponse, TestServer};
use tempfile::TempDir;

use tally_core::CounterId;
use tally_service::signature::{signature_header, SIGNATURE_HEADER};
use tally_service::{create_router, AppState, ServiceConfig};
use tally_store::{CounterStore, RocksStore};

/// Signing secret shared by the harness and the requests it signs.
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server.
    pub store: Arc<dyn CounterStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness with a fresh database and adjusted configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");
        Self::build(Arc::new(store), temp_dir, adjust)
    }

    /// Create a harness over an arbitrary store implementation.
    pub fn with_store(
        store: Arc<dyn CounterStore>,
        adjust: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::build(store, temp_dir, adjust)
    }

    fn build(
        store: Arc<dyn CounterStore>,
        temp_dir: TempDir,
        adjust: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let mut config = ServiceConfig::new(WEBHOOK_SECRET);
        config.listen_addr = "127.0.0.1:0".into();
        config.data_dir = temp_dir.path().to_string_lossy().to_string();
        adjust(&mut config);

        let state = AppState::new(Arc::clone(&store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            _temp_dir: temp_dir,
        }
    }

    /// POST a webhook body with an optional signature header.
    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> TestResponse {
        let mut request = self
            .server
            .post("/webhook")
            .content_type("application/json")
            .bytes(body.as_bytes().to_vec().into());

        if let Some(signature) = signature {
            request = request.add_header(
                HeaderName::from_static(SIGNATURE_HEADER),
                HeaderValue::from_str(signature).expect("valid header value"),
            );
        }

        request.await
    }

    /// POST a webhook body signed with the harness secret at the current time.
    pub async fn post_signed(&self, body: &str) -> TestResponse {
        let signature = sign(WEBHOOK_SECRET, body);
        self.post_webhook(body, Some(&signature)).await
    }

    /// Current value of a counter, zero if it was never written.
    pub fn counter(&self, name: &str) -> u64 {
        let id = CounterId::new(name).expect("valid counter id");
        self.store
            .get_counter(&id)
            .expect("counter read")
            .map_or(0, |doc| doc.value)
    }

    /// Bring a counter up to `value` from zero.
    pub fn seed(&self, name: &str, value: u64) {
        let id = CounterId::new(name).expect("valid counter id");
        for _ in 0..value {
            self.store.increment(&id).expect("seed increment");
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Signature header for `body` under `secret`, timestamped now.
pub fn sign(secret: &str, body: &str) -> String {
    signature_header(secret, chrono::Utc::now().timestamp(), body.as_bytes())
}

/// A `checkout.session.completed` event body.
pub fn checkout_completed(event_id: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_123",
                "object": "checkout.session",
                "payment_status": "paid"
            }
        }
    })
    .to_string()
}

/// An event body with an arbitrary type.
pub fn event_of_type(event_id: &str, event_type: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": event_type,
        "data": { "object": {} }
    })
    .to_string()
}
