//! Key and value encoding utilities for `RocksDB`.

use tally_core::{CounterId, TokenId};

use crate::error::{Result, StoreError};

/// Size of an encoded counter value.
pub const COUNTER_VALUE_LEN: usize = 8;

/// Create a counter key from a counter id.
#[must_use]
pub fn counter_key(id: &CounterId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Create an access token key from a token id.
#[must_use]
pub fn access_token_key(id: &TokenId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Create a processed-event key from a provider event id.
#[must_use]
pub fn processed_event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Encode a counter value (or merge operand).
#[must_use]
pub fn encode_counter(value: u64) -> [u8; COUNTER_VALUE_LEN] {
    value.to_le_bytes()
}

/// Decode a counter value.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the value is not exactly 8 bytes.
pub fn decode_counter(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; COUNTER_VALUE_LEN] = bytes.try_into().map_err(|_| {
        StoreError::Serialization(format!(
            "counter value has {} bytes, expected {COUNTER_VALUE_LEN}",
            bytes.len()
        ))
    })?;
    Ok(u64::from_le_bytes(raw))
}
