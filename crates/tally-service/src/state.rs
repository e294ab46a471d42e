//! Application state.

use std::sync::Arc;

use tally_store::CounterStore;

use crate::config::ServiceConfig;
use crate::dispatch::EventDispatcher;
use crate::signature::SignatureVerifier;
use crate::store_client::StoreClient;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
///
/// Every collaborator is built here from explicit inputs, so tests can swap
/// the store or the signing secret without touching process globals.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: StoreClient,

    /// Webhook signature verifier.
    pub verifier: SignatureVerifier,

    /// Event-type to counter routing.
    pub dispatcher: EventDispatcher,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for checkout sessions (optional).
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, config: ServiceConfig) -> Self {
        let store = StoreClient::new(store, config.store_timeout).with_dedupe(config.dedupe_events);

        let verifier = SignatureVerifier::new(config.stripe_webhook_secret.clone())
            .with_tolerance(config.signature_tolerance);

        let dispatcher = EventDispatcher::new(config.counted_events.clone());

        // Create Stripe client if configured
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key.clone()) {
                Ok(client) => {
                    tracing::info!("Stripe checkout enabled");
                    Some(Arc::new(client.with_base_url(config.stripe_api_base.clone())))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe API key not configured - checkout sessions will fail");
        }

        if store.dedupe() {
            tracing::info!("Event deduplication enabled");
        }

        Self {
            store,
            verifier,
            dispatcher,
            config,
            stripe,
        }
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }
}
