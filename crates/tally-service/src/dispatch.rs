//! Event dispatch.
//!
//! Which event types move which counter is a configuration table
//! ([`CounterRoutes`]), not code: adding a counted event type means adding a
//! route. Verified events with no route are acknowledged and ignored, since
//! the provider adds new event types over time.

use std::collections::HashMap;
use std::str::FromStr;

use tally_core::{CounterId, EventKind};

use crate::config::ConfigError;
use crate::signature::VerifiedEvent;
use crate::store_client::StoreClient;

/// Counter updated by default.
pub const DEFAULT_COUNTER: &str = "live";

/// Mapping from event type to the counter it increments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRoutes {
    routes: HashMap<EventKind, CounterId>,
}

impl CounterRoutes {
    /// A table with no routes: every event is ignored.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Add (or replace) the route for `kind`.
    #[must_use]
    pub fn with_route(mut self, kind: EventKind, counter: CounterId) -> Self {
        self.routes.insert(kind, counter);
        self
    }

    /// The counter `kind` increments, if any.
    #[must_use]
    pub fn counter_for(&self, kind: &EventKind) -> Option<&CounterId> {
        self.routes.get(kind)
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for CounterRoutes {
    /// Completed checkout sessions count towards `live`.
    fn default() -> Self {
        Self {
            routes: HashMap::from([(
                EventKind::CheckoutSessionCompleted,
                CounterId::new(DEFAULT_COUNTER).expect("default counter id is valid"),
            )]),
        }
    }
}

/// Parses `event.type=counter` pairs separated by commas, e.g.
/// `checkout.session.completed=live,payment_intent.succeeded=payments`.
impl FromStr for CounterRoutes {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut routes = Self::empty();

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (kind, counter) = entry
                .split_once('=')
                .map(|(k, c)| (k.trim(), c.trim()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| ConfigError::InvalidRoute(entry.to_string()))?;

            let counter = CounterId::new(counter)?;
            routes = routes.with_route(EventKind::from(kind), counter);
        }

        Ok(routes)
    }
}

/// What a verified event should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Add one to the counter.
    Increment {
        /// Target counter.
        counter: CounterId,
    },
    /// Acknowledge without side effects.
    Ignore,
}

/// Result of dispatching one event. Never an error: the provider is
/// acknowledged whatever happens here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The counter was incremented.
    Counted {
        /// Counter that moved.
        counter: CounterId,
    },
    /// The event had already been counted.
    Duplicate,
    /// No handler for the event.
    Ignored,
    /// The store failed; the increment was not acknowledged.
    StoreFailed,
}

/// Routes verified events to counter increments.
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    routes: CounterRoutes,
}

impl EventDispatcher {
    /// Create a dispatcher over a routing table.
    #[must_use]
    pub fn new(routes: CounterRoutes) -> Self {
        Self { routes }
    }

    /// The routing table.
    #[must_use]
    pub fn routes(&self) -> &CounterRoutes {
        &self.routes
    }

    /// Decide what `event` should do without touching the store.
    #[must_use]
    pub fn route(&self, event: &VerifiedEvent) -> Dispatch {
        let Some(counter) = self.routes.counter_for(event.kind()) else {
            return Dispatch::Ignore;
        };

        // Delayed payment methods complete the session before the money moves
        if *event.kind() == EventKind::CheckoutSessionCompleted
            && event
                .object()
                .get("payment_status")
                .and_then(serde_json::Value::as_str)
                == Some("unpaid")
        {
            return Dispatch::Ignore;
        }

        Dispatch::Increment {
            counter: counter.clone(),
        }
    }

    /// Apply the side effect for `event`, if any.
    pub async fn dispatch(&self, store: &StoreClient, event: &VerifiedEvent) -> Outcome {
        let counter = match self.route(event) {
            Dispatch::Increment { counter } => counter,
            Dispatch::Ignore => {
                tracing::debug!(
                    event_id = ?event.id(),
                    event_type = %event.kind(),
                    "Unhandled event type, acknowledging"
                );
                return Outcome::Ignored;
            }
        };

        match store.increment(&counter, event.id()).await {
            Ok(()) => {
                tracing::info!(
                    event_id = ?event.id(),
                    event_type = %event.kind(),
                    counter = %counter,
                    "Payment received, counter updated"
                );
                Outcome::Counted { counter }
            }
            Err(e) if e.is_duplicate() => {
                tracing::info!(
                    event_id = ?event.id(),
                    counter = %counter,
                    "Event already counted, skipping redelivery"
                );
                Outcome::Duplicate
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    event_id = ?event.id(),
                    event_type = %event.kind(),
                    counter = %counter,
                    "Counter update failed; event acknowledged without counting"
                );
                Outcome::StoreFailed
            }
        }
    }
}
