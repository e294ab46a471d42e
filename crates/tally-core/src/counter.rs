//! Counter documents.

use serde::{Deserialize, Serialize};

use crate::CounterId;

/// A named counter as held by the shared store.
///
/// The value only ever grows; it is mutated exclusively through the store's
/// atomic increment and read here for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDocument {
    /// Logical counter name.
    pub id: CounterId,

    /// Current value.
    pub value: u64,
}

impl CounterDocument {
    /// Create a counter document.
    #[must_use]
    pub const fn new(id: CounterId, value: u64) -> Self {
        Self { id, value }
    }
}
