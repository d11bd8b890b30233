//! Named subscriptions for inbound hub invocations.
//!
//! The registry maps a hub method name to a callback plus the parameter
//! labels the caller supplied when subscribing. Registering the same name
//! again replaces the earlier entry rather than stacking a second callback.
//!
//! The registry also implements [`InvocationBinder`], so the decode path can
//! ask it how many arguments a given target expects when deciding whether an
//! inbound invocation is routable or belongs to the catch-all target.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use hubtap_core::{DynamicValue, InvocationBinder};

/// Callback invoked with the decoded arguments of an inbound invocation.
///
/// Callbacks run on the session's dispatch task, one at a time and in
/// arrival order, so they may hold mutable state without extra locking.
pub type SubscriptionCallback = Box<dyn Fn(&[DynamicValue]) + Send + Sync + 'static>;

// ── Subscription ──────────────────────────────────────────────────────────────

/// A single registered handler together with its parameter labels.
pub struct Subscription {
    labels: Vec<String>,
    callback: SubscriptionCallback,
}

impl Subscription {
    /// Labels the subscriber assigned to the method's parameters, in order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of arguments this subscription expects.
    pub fn parameter_count(&self) -> usize {
        self.labels.len()
    }

    /// Runs the callback with the decoded arguments.
    pub fn dispatch(&self, arguments: &[DynamicValue]) {
        (self.callback)(arguments);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Thread-safe map of method name to subscription.
///
/// Lookups clone the entry's `Arc` and release the lock before the caller
/// runs the callback, so a callback may register or remove subscriptions
/// without deadlocking.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<String, Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for `method`, replacing any existing entry.
    ///
    /// Returns `true` when an earlier subscription was replaced. The replaced
    /// entry is dropped as soon as no in-flight dispatch still holds it.
    pub fn register(
        &self,
        method: &str,
        labels: Vec<String>,
        callback: SubscriptionCallback,
    ) -> bool {
        let subscription = Arc::new(Subscription { labels, callback });
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = entries.insert(method.to_owned(), subscription).is_some();
        if replaced {
            debug!(%method, "replaced existing subscription");
        } else {
            debug!(%method, "registered subscription");
        }
        replaced
    }

    /// Removes the subscription for `method`. Returns `false` if none existed.
    pub fn remove(&self, method: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.remove(method).is_some();
        if removed {
            debug!(%method, "removed subscription");
        }
        removed
    }

    /// Fetches the subscription for `method`, if one is registered.
    pub fn lookup(&self, method: &str) -> Option<Arc<Subscription>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InvocationBinder for SubscriptionRegistry {
    fn parameter_count(&self, target: &str) -> Option<usize> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .map(|subscription| subscription.parameter_count())
    }
}
