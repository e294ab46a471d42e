//! `RocksDB` storage layer for tally.
//!
//! This crate provides persistent storage for counters and access tokens
//! using `RocksDB` column families.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `counters`: Counter values, keyed by counter name, updated only through
//!   an associative add merge operator so increments never read-modify-write
//! - `access_tokens`: Access token records, keyed by token id
//! - `processed_events`: Provider event ids already counted (deduplication)
//!
//! # Example
//!
//! ```no_run
//! use tally_core::CounterId;
//! use tally_store::{CounterStore, RocksStore};
//!
//! let store = RocksStore::open("/tmp/tally-db").unwrap();
//! let live = CounterId::new("live").unwrap();
//!
//! store.increment(&live).unwrap();
//! let doc = store.get_counter(&live).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use tally_core::{AccessToken, CounterDocument, CounterId, TokenId};

/// The storage trait shared by the webhook pipeline and the checkout flow.
///
/// Implementations must make `increment` a single atomic operation on the
/// store side. Callers never read a counter in order to write it.
pub trait CounterStore: Send + Sync {
    // =========================================================================
    // Counter Operations
    // =========================================================================

    /// Atomically add one to the named counter, creating it at zero first if
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected. No partial increment is
    /// applied in that case.
    fn increment(&self, counter: &CounterId) -> Result<()>;

    /// Atomically add one to the named counter unless `event_id` has already
    /// been counted, recording the event id in the same write.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateEvent` if the event was already counted.
    /// - `StoreError::Database` if the write is rejected.
    fn increment_once(&self, counter: &CounterId, event_id: &str) -> Result<()>;

    /// Read a counter for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_counter(&self, counter: &CounterId) -> Result<Option<CounterDocument>>;

    /// Check whether an event id has already been counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_processed_event(&self, event_id: &str) -> Result<bool>;

    /// Forget event ids counted before `before`, returning how many were
    /// removed. A redelivery of a forgotten event counts again. Stores that
    /// keep no event ids have nothing to prune.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn prune_processed_events(&self, _before: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }

    // =========================================================================
    // Access Token Operations
    // =========================================================================

    /// Mint and persist a new access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written.
    fn issue_access_token(&self) -> Result<AccessToken>;

    /// Get an access token by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_access_token(&self, id: &TokenId) -> Result<Option<AccessToken>>;
}
