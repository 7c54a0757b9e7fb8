//! Availability change fan-out.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use observability::CatalogMetrics;

use crate::models::{Availability, CatalogItem};

/// Failure reported by a subscriber. Logged and counted, never propagated
/// to the operation that triggered the notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives availability transitions.
pub trait AvailabilitySubscriber: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn on_availability_changed(
        &self,
        item: &CatalogItem,
        old: Availability,
        new: Availability,
    ) -> Result<(), SubscriberError>;
}

/// Token returned by [`ChangeNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Names of the subscribers that returned an error or panicked
    pub failed: Vec<&'static str>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

type Registration = (SubscriptionId, Arc<dyn AvailabilitySubscriber>);

/// Registry of availability subscribers.
///
/// Subscribers are identified by their shared handle: subscribing the same
/// `Arc` twice returns the original token. Notification runs on the caller's
/// thread in registration order, over a snapshot taken before the first
/// subscriber is called.
#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<Registration>>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_names())
            .finish()
    }
}

fn same_subscriber(
    a: &Arc<dyn AvailabilitySubscriber>,
    b: &Arc<dyn AvailabilitySubscriber>,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "subscriber panicked".to_string()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; a handle that is already registered keeps its token
    pub fn subscribe(&self, subscriber: Arc<dyn AvailabilitySubscriber>) -> SubscriptionId {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);

        if let Some((id, _)) = subscribers
            .iter()
            .find(|(_, existing)| same_subscriber(existing, &subscriber))
        {
            debug!(subscription_id = %id, "Subscriber already registered");
            return *id;
        }

        let id = SubscriptionId::new();
        debug!(subscription_id = %id, subscriber = subscriber.name(), "Subscriber registered");
        subscribers.push((id, subscriber));
        id
    }

    /// Remove a subscription. Returns false for an unknown token.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        let removed = subscribers.len() != before;

        if removed {
            debug!(subscription_id = %id, "Subscriber removed");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot of the registered subscribers, in registration order
    pub fn list(&self) -> Vec<Arc<dyn AvailabilitySubscriber>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }

    pub fn subscriber_names(&self) -> Vec<&'static str> {
        self.list().iter().map(|s| s.name()).collect()
    }

    /// Deliver `(item, old, new)` to every subscriber.
    ///
    /// A subscriber that errors or panics is logged and counted; the remaining
    /// subscribers are still called.
    pub fn notify_all(
        &self,
        item: &CatalogItem,
        old: Availability,
        new: Availability,
    ) -> DeliveryReport {
        let snapshot = self.list();
        let mut report = DeliveryReport::default();

        for subscriber in snapshot {
            let name = subscriber.name();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                subscriber.on_availability_changed(item, old, new)
            }));

            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    warn!(item_id = %item.id, subscriber = name, error = %err, "Subscriber failed");
                    CatalogMetrics::record_subscriber_failure(name);
                    report.failed.push(name);
                }
                Err(payload) => {
                    warn!(
                        item_id = %item.id,
                        subscriber = name,
                        panic = %panic_message(payload.as_ref()),
                        "Subscriber panicked"
                    );
                    CatalogMetrics::record_subscriber_failure(name);
                    report.failed.push(name);
                }
            }
        }

        report
    }
}
