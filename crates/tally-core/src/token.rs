//! Access tokens handed out with checkout sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TokenId;

/// An opaque token minted when a checkout session is requested.
///
/// The token is embedded in the post-payment redirect URL. It carries no
/// expiry and is not consumed on use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Token identifier.
    pub id: TokenId,

    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    /// Mint a new token with a fresh id, stamped with the current time.
    #[must_use]
    pub fn issue() -> Self {
        Self {
            id: TokenId::generate(),
            created_at: Utc::now(),
        }
    }
}
