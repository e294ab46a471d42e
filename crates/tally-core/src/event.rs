//! Payment provider event types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a provider event.
///
/// Known types get their own variant; anything else is preserved verbatim
/// in `Other` so new provider event types flow through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// `checkout.session.completed`
    CheckoutSessionCompleted,
    /// `payment_intent.succeeded`
    PaymentIntentSucceeded,
    /// Any other event type.
    Other(String),
}

impl EventKind {
    /// The wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::Other(name) => name,
        }
    }

    /// Whether this is one of the explicitly modelled types.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            _ => Self::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_parse() {
        assert_eq!(
            EventKind::from("checkout.session.completed"),
            EventKind::CheckoutSessionCompleted
        );
        assert_eq!(
            EventKind::from("payment_intent.succeeded"),
            EventKind::PaymentIntentSucceeded
        );
    }

    #[test]
    fn unknown_types_are_preserved() {
        let kind = EventKind::from("invoice.paid");
        assert_eq!(kind, EventKind::Other("invoice.paid".into()));
        assert!(!kind.is_known());
        assert_eq!(kind.as_str(), "invoice.paid");
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&EventKind::CheckoutSessionCompleted).unwrap();
        assert_eq!(json, "\"checkout.session.completed\"");

        let kind: EventKind = serde_json::from_str("\"charge.refunded\"").unwrap();
        assert_eq!(kind, EventKind::Other("charge.refunded".into()));
    }
}
