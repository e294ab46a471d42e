//! Async access to the counter store.
//!
//! The store is synchronous (`RocksDB`), so every call runs on the blocking
//! pool and is bounded by a timeout. A call that times out is reported as a
//! failure to the caller even though the blocking write may still land
//! afterwards; the write itself stays atomic either way.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{AccessToken, CounterId};
use tally_store::{CounterStore, StoreError};
use tokio::task::JoinHandle;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the event pruner runs.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Why a store call did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum StoreFailure {
    /// The store did not answer within the configured timeout.
    #[error("store unavailable: no response within {0:?}")]
    Timeout(Duration),

    /// The store rejected the operation.
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    /// The blocking task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

impl StoreFailure {
    /// Whether this failure is the store reporting an already-counted event.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Store(StoreError::DuplicateEvent { .. }))
    }
}

/// Handle to the shared store used by request handlers.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn CounterStore>,
    timeout: Duration,
    dedupe: bool,
}

impl StoreClient {
    /// Wrap a store with the given per-call timeout.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            dedupe: false,
        }
    }

    /// Count each provider event id at most once.
    #[must_use]
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Whether per-event deduplication is enabled.
    #[must_use]
    pub fn dedupe(&self) -> bool {
        self.dedupe
    }

    /// Add one to `counter` on behalf of the event `event_id`.
    ///
    /// With deduplication enabled and an event id present, an event that was
    /// already counted yields `StoreFailure::Store(StoreError::DuplicateEvent)`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreFailure` if the store rejects or does not acknowledge
    /// the increment.
    pub async fn increment(
        &self,
        counter: &CounterId,
        event_id: Option<&str>,
    ) -> Result<(), StoreFailure> {
        let counter = counter.clone();

        match (self.dedupe, event_id) {
            (true, Some(event_id)) => {
                let event_id = event_id.to_string();
                self.run(move |store| store.increment_once(&counter, &event_id))
                    .await
            }
            (true, None) => {
                tracing::warn!(
                    counter = %counter,
                    "Event has no id; counting without deduplication"
                );
                self.run(move |store| store.increment(&counter)).await
            }
            (false, _) => self.run(move |store| store.increment(&counter)).await,
        }
    }

    /// Mint and persist a new access token.
    ///
    /// # Errors
    ///
    /// Returns a `StoreFailure` if the token could not be persisted in time.
    pub async fn issue_access_token(&self) -> Result<AccessToken, StoreFailure> {
        self.run(|store| store.issue_access_token()).await
    }

    /// Forget processed event ids older than `retention`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreFailure` if the store fails or does not answer in time.
    pub async fn prune_processed_events(
        &self,
        retention: Duration,
    ) -> Result<usize, StoreFailure> {
        let Some(before) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| chrono::Utc::now().checked_sub_signed(retention))
        else {
            // Retention reaches past the representable range: nothing is old enough
            return Ok(0);
        };

        self.run(move |store| store.prune_processed_events(before)).await
    }

    /// Prune processed event ids every `every`, keeping `retention` worth.
    pub fn spawn_event_pruner(&self, retention: Duration, every: Duration) -> JoinHandle<()> {
        let client = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match client.prune_processed_events(retention).await {
                    Ok(0) => {}
                    Ok(pruned) => tracing::info!(pruned, "Pruned processed event ids"),
                    Err(e) => tracing::error!(error = %e, "Failed to prune processed event ids"),
                }
            }
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreFailure>
    where
        F: FnOnce(&dyn CounterStore) -> tally_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || op(store.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(StoreFailure::Timeout(self.timeout)),
            Ok(Err(e)) => Err(StoreFailure::Task(e.to_string())),
            Ok(Ok(result)) => result.map_err(StoreFailure::from),
        }
    }
}
