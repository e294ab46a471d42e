//! Core types and utilities for tally.
//!
//! This crate provides the foundational types shared by the store and the
//! HTTP service:
//!
//! - **Identifiers**: `CounterId`, `TokenId`
//! - **Counters**: `CounterDocument`
//! - **Tokens**: `AccessToken`
//! - **Events**: `EventKind`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod counter;
pub mod event;
pub mod ids;
pub mod token;

pub use counter::CounterDocument;
pub use event::EventKind;
pub use ids::{CounterId, IdError, TokenId, MAX_COUNTER_ID_LEN};
pub use token::AccessToken;
