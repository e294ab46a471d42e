//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Counter values, keyed by counter name. Values are `u64` little-endian
    /// and only ever written through the add merge operator.
    pub const COUNTERS: &str = "counters";

    /// Access token records, keyed by token id (16 bytes).
    pub const ACCESS_TOKENS: &str = "access_tokens";

    /// Provider event ids already counted, keyed by event id, valued with
    /// the CBOR `processed_at` timestamp. Only written when delivery
    /// deduplication is enabled. Grows with every counted event until
    /// `prune_processed_events` removes old entries.
    pub const PROCESSED_EVENTS: &str = "processed_events";
}

/// Name under which the counter merge operator is registered.
pub const COUNTER_MERGE_OPERATOR: &str = "tally.counter_add";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::COUNTERS, cf::ACCESS_TOKENS, cf::PROCESSED_EVENTS]
}
