//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `CounterStore`
//! trait.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MergeOperands,
    MultiThreaded, Options, WriteBatch, WriteOptions,
};

use tally_core::{AccessToken, CounterDocument, CounterId, TokenId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, COUNTER_MERGE_OPERATOR};
use crate::CounterStore;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes the check-and-record step of `increment_once`.
    dedupe_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Self::cf_options(name)))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            dedupe_lock: Mutex::new(()),
        })
    }

    /// Column family options. The counters family carries the add operator.
    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        if name == cf::COUNTERS {
            opts.set_merge_operator_associative(COUNTER_MERGE_OPERATOR, counter_add);
        }
        opts
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Writes are synced to the WAL before they are acknowledged.
    fn write_options() -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        opts
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Associative merge: sum of the existing value and every operand.
fn counter_add(
    _key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let mut total = match existing {
        Some(bytes) => keys::decode_counter(bytes).ok()?,
        None => 0,
    };

    for operand in operands.iter() {
        total = total.saturating_add(keys::decode_counter(operand).ok()?);
    }

    Some(keys::encode_counter(total).to_vec())
}

impl CounterStore for RocksStore {
    // =========================================================================
    // Counter Operations
    // =========================================================================

    fn increment(&self, counter: &CounterId) -> Result<()> {
        let cf = self.cf(cf::COUNTERS)?;
        let key = keys::counter_key(counter);

        self.db
            .merge_cf_opt(&cf, key, keys::encode_counter(1), &Self::write_options())
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(counter = %counter, "Counter incremented");
        Ok(())
    }

    fn increment_once(&self, counter: &CounterId, event_id: &str) -> Result<()> {
        let cf_counters = self.cf(cf::COUNTERS)?;
        let cf_events = self.cf(cf::PROCESSED_EVENTS)?;

        let _guard = self
            .dedupe_lock
            .lock()
            .map_err(|_| StoreError::Database("deduplication lock poisoned".into()))?;

        if self.has_processed_event(event_id)? {
            return Err(StoreError::DuplicateEvent {
                event_id: event_id.to_string(),
            });
        }

        let processed_at: DateTime<Utc> = Utc::now();
        let event_value = Self::serialize(&processed_at)?;

        // Record and count in one atomic write
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_events, keys::processed_event_key(event_id), event_value);
        batch.merge_cf(
            &cf_counters,
            keys::counter_key(counter),
            keys::encode_counter(1),
        );

        self.db
            .write_opt(batch, &Self::write_options())
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(counter = %counter, event_id = %event_id, "Counter incremented once");
        Ok(())
    }

    fn get_counter(&self, counter: &CounterId) -> Result<Option<CounterDocument>> {
        let cf = self.cf(cf::COUNTERS)?;
        let key = keys::counter_key(counter);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| keys::decode_counter(&data))
            .transpose()
            .map(|value| value.map(|value| CounterDocument::new(counter.clone(), value)))
    }

    fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        let key = keys::processed_event_key(event_id);

        let exists = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        Ok(exists)
    }

    fn prune_processed_events(&self, before: DateTime<Utc>) -> Result<usize> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;

        // Hold off increment_once so a pruned id cannot race a redelivery
        let _guard = self
            .dedupe_lock
            .lock()
            .map_err(|_| StoreError::Database("deduplication lock poisoned".into()))?;

        let mut batch = WriteBatch::default();
        let mut pruned = 0;

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let processed_at: DateTime<Utc> = Self::deserialize(&value)?;
            if processed_at < before {
                batch.delete_cf(&cf, key);
                pruned += 1;
            }
        }

        if pruned > 0 {
            self.db
                .write_opt(batch, &Self::write_options())
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tracing::debug!(pruned, before = %before, "Pruned processed events");
        Ok(pruned)
    }

    // =========================================================================
    // Access Token Operations
    // =========================================================================

    fn issue_access_token(&self) -> Result<AccessToken> {
        let cf = self.cf(cf::ACCESS_TOKENS)?;
        let token = AccessToken::issue();
        let key = keys::access_token_key(&token.id);
        let value = Self::serialize(&token)?;

        self.db
            .put_cf_opt(&cf, key, value, &Self::write_options())
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(token_id = %token.id, "Access token issued");
        Ok(token)
    }

    fn get_access_token(&self, id: &TokenId) -> Result<Option<AccessToken>> {
        let cf = self.cf(cf::ACCESS_TOKENS)?;
        let key = keys::access_token_key(id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }
}
