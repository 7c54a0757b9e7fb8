//! Presentation bundles attached to a catalog item.
//!
//! Bundles are transient: they are built on request, never persisted and have
//! no effect on the loan state machine. An [`AugmentedItem`] folds its bundles
//! in attachment order to produce the extended description and the
//! additional-info line.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::LoanPolicy;
use crate::loan::LoanRecord;
use crate::models::{Availability, CatalogItem};

pub const SPECIAL_COLLECTIONS_ROOM: &str = "Special Collections Room";

/// A hold placed on an item by a patron
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reserved_by: String,
    /// 1-based position in the hold queue
    pub queue_position: u32,
}

impl Reservation {
    pub fn new(reserved_by: impl Into<String>, queue_position: u32) -> Self {
        Self {
            reserved_by: reserved_by.into(),
            queue_position,
        }
    }

    pub fn is_next_in_queue(&self) -> bool {
        self.queue_position == 1
    }

    fn info(&self) -> String {
        format!(
            "RESERVATION: Reserved by {}, Queue position: {}",
            self.reserved_by, self.queue_position
        )
    }
}

/// Membership of an item in a special collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialCollection {
    pub collection_name: String,
    pub requires_approval: bool,
    pub location: String,
}

impl SpecialCollection {
    pub fn new(
        collection_name: impl Into<String>,
        requires_approval: bool,
        location: impl Into<String>,
    ) -> Self {
        Self {
            collection_name: collection_name.into(),
            requires_approval,
            location: location.into(),
        }
    }

    /// Collection kept in the special collections room, loans need approval
    pub fn restricted(collection_name: impl Into<String>) -> Self {
        Self::new(collection_name, true, SPECIAL_COLLECTIONS_ROOM)
    }

    pub fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn info(&self) -> String {
        let approval = if self.requires_approval {
            ", Requires approval for loan"
        } else {
            ""
        };
        format!(
            "SPECIAL COLLECTION: {}, Location: {}{}",
            self.collection_name, self.location, approval
        )
    }
}

/// One bundle attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Augmentation {
    Loan(LoanRecord),
    Reservation(Reservation),
    SpecialCollection(SpecialCollection),
}

impl Augmentation {
    fn suffix(&self) -> String {
        match self {
            Augmentation::Loan(_) => " [ON LOAN]".to_string(),
            Augmentation::Reservation(_) => " [RESERVED]".to_string(),
            Augmentation::SpecialCollection(c) => {
                format!(" [SPECIAL COLLECTION: {}]", c.collection_name)
            }
        }
    }

    fn info(&self, today: NaiveDate, policy: &LoanPolicy) -> String {
        match self {
            Augmentation::Loan(loan) => loan.summary(today, policy),
            Augmentation::Reservation(r) => r.info(),
            Augmentation::SpecialCollection(c) => c.info(),
        }
    }
}

/// A catalog item together with the bundles attached to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentedItem {
    pub item: CatalogItem,
    pub augmentations: Vec<Augmentation>,
}

impl AugmentedItem {
    pub fn new(item: CatalogItem) -> Self {
        Self {
            item,
            augmentations: Vec::new(),
        }
    }

    /// Attach another bundle after the existing ones
    pub fn with(mut self, augmentation: Augmentation) -> Self {
        self.augmentations.push(augmentation);
        self
    }

    /// Base description followed by one suffix per bundle
    pub fn description(&self) -> String {
        self.augmentations
            .iter()
            .fold(self.item.description(), |mut description, augmentation| {
                description.push_str(&augmentation.suffix());
                description
            })
    }

    /// Bundle details joined with ` | `; empty when nothing is attached
    pub fn additional_info(&self, today: NaiveDate, policy: &LoanPolicy) -> String {
        self.augmentations
            .iter()
            .map(|a| a.info(today, policy))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// `Loaned` while a loan bundle is attached, otherwise the item's own state
    pub fn availability(&self) -> Availability {
        if self.loan().is_some() {
            Availability::Loaned
        } else {
            self.item.availability
        }
    }

    pub fn loan(&self) -> Option<&LoanRecord> {
        self.augmentations.iter().find_map(|a| match a {
            Augmentation::Loan(loan) => Some(loan),
            _ => None,
        })
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        self.augmentations.iter().find_map(|a| match a {
            Augmentation::Reservation(r) => Some(r),
            _ => None,
        })
    }

    pub fn special_collection(&self) -> Option<&SpecialCollection> {
        self.augmentations.iter().find_map(|a| match a {
            Augmentation::SpecialCollection(c) => Some(c),
            _ => None,
        })
    }
}
