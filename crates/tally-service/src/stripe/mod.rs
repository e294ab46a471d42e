//! Stripe integration for checkout sessions.
//!
//! Only session creation is needed here: payment confirmation arrives
//! through the signed webhook, never by polling the API.

pub mod client;
pub mod types;

pub use client::{CheckoutConfig, StripeClient, StripeError, STRIPE_API_BASE};
pub use types::*;
