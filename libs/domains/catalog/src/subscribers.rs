//! Built-in availability subscribers.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::models::{Availability, CatalogItem, ItemId};
use crate::notifier::{AvailabilitySubscriber, SubscriberError};

/// One line of the inventory audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub item_id: ItemId,
    pub title: String,
    pub author: String,
    pub old: Availability,
    pub new: Availability,
}

impl std::fmt::Display for InventoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] INVENTORY LOG - Book ID: {}, Title: '{}', Author: '{}', State Change: {} → {}",
            self.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            self.item_id,
            self.title,
            self.author,
            self.old,
            self.new
        )
    }
}

/// Audit trail of every availability change
#[derive(Debug, Default)]
pub struct InventoryLog {
    entries: Mutex<Vec<InventoryEntry>>,
}

impl InventoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<InventoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AvailabilitySubscriber for InventoryLog {
    fn name(&self) -> &'static str {
        "InventoryLog"
    }

    fn on_availability_changed(
        &self,
        item: &CatalogItem,
        old: Availability,
        new: Availability,
    ) -> Result<(), SubscriberError> {
        let entry = InventoryEntry {
            recorded_at: Utc::now(),
            item_id: item.id,
            title: item.title.clone(),
            author: item.author.clone(),
            old,
            new,
        };
        info!(item_id = %item.id, %old, %new, "{entry}");

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}

/// Composes an availability notice for one recipient.
///
/// Delivery is not wired to a mail transport; composed messages are logged
/// and kept in [`sent`](Self::sent).
#[derive(Debug)]
pub struct EmailNotifier {
    recipient: String,
    sent: Mutex<Vec<String>>,
}

impl EmailNotifier {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AvailabilitySubscriber for EmailNotifier {
    fn name(&self) -> &'static str {
        "EmailNotifier"
    }

    fn on_availability_changed(
        &self,
        item: &CatalogItem,
        old: Availability,
        new: Availability,
    ) -> Result<(), SubscriberError> {
        if self.recipient.trim().is_empty() {
            return Err(SubscriberError::new("no recipient configured"));
        }

        let message = format!(
            "Email sent to {}: Book '{}' (ID: {}) state changed from '{}' to '{}'",
            self.recipient, item.title, item.id, old, new
        );
        info!(item_id = %item.id, recipient = %self.recipient, "{message}");

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counts {
    by_transition: BTreeMap<String, u64>,
    total: u64,
}

/// Counts transitions per `Old → New` key
#[derive(Debug, Default)]
pub struct TransitionStatistics {
    counts: Mutex<Counts>,
}

impl TransitionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the per-transition counts
    pub fn statistics(&self) -> BTreeMap<String, u64> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_transition
            .clone()
    }

    pub fn total_transitions(&self) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
    }

    pub fn reset(&self) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts = Counts::default();
        info!("Transition statistics reset");
    }
}

impl AvailabilitySubscriber for TransitionStatistics {
    fn name(&self) -> &'static str {
        "TransitionStatistics"
    }

    fn on_availability_changed(
        &self,
        _item: &CatalogItem,
        old: Availability,
        new: Availability,
    ) -> Result<(), SubscriberError> {
        let key = format!("{old} → {new}");
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);

        let count = counts.by_transition.entry(key.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        counts.total += 1;

        info!(transition = %key, count, total = counts.total, "Transition statistics updated");
        Ok(())
    }
}
