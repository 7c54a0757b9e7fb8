use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::LoanPolicy;
use crate::models::{CatalogItem, ItemId};

const DATE_FORMAT: &str = "%d/%m/%Y";

/// An active lending transaction on a catalog item.
///
/// Records are immutable: a renewal produces a new record that replaces the
/// old one in the active-loan registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub item_id: ItemId,
    pub borrower_name: String,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub renewal_count: u8,
}

/// Classification of a loan on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "renewals", rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Renewed(u8),
    Overdue,
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

impl LoanRecord {
    /// Open a loan starting `today`, due one loan period later
    pub fn open(
        item_id: ItemId,
        borrower_name: impl Into<String>,
        today: NaiveDate,
        policy: &LoanPolicy,
    ) -> Self {
        Self {
            item_id,
            borrower_name: borrower_name.into(),
            loan_date: today,
            due_date: add_days(today, policy.loan_period_days),
            renewal_count: 0,
        }
    }

    /// The record that replaces this one after a renewal.
    ///
    /// Eligibility is checked by the caller with [`can_renew`](Self::can_renew).
    pub fn renewed(&self, policy: &LoanPolicy) -> Self {
        Self {
            due_date: add_days(self.due_date, policy.loan_period_days),
            renewal_count: self.renewal_count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        today > self.due_date
    }

    /// Whole days past the due date, 0 when not overdue
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days().max(0)
    }

    /// Days until the due date; negative once overdue
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_date - today).num_days()
    }

    pub fn can_renew(&self, today: NaiveDate, policy: &LoanPolicy) -> bool {
        self.renewal_count < policy.max_renewals && !self.is_overdue(today)
    }

    pub fn calculate_fine(&self, today: NaiveDate, policy: &LoanPolicy) -> f64 {
        self.days_overdue(today) as f64 * policy.fine_per_day
    }

    pub fn status(&self, today: NaiveDate) -> LoanStatus {
        if self.is_overdue(today) {
            LoanStatus::Overdue
        } else if self.renewal_count > 0 {
            LoanStatus::Renewed(self.renewal_count)
        } else {
            LoanStatus::Active
        }
    }

    /// Single-line loan summary, e.g.
    /// `LOAN DETAILS: Borrower: Alice, Loaned: 01/03/2024, Due: 15/03/2024, Days remaining: 14, Renewals: 0/3`
    pub fn summary(&self, today: NaiveDate, policy: &LoanPolicy) -> String {
        let mut summary = format!(
            "LOAN DETAILS: Borrower: {}, Loaned: {}, Due: {}, Days remaining: {}, Renewals: {}/{}",
            self.borrower_name,
            self.loan_date.format(DATE_FORMAT),
            self.due_date.format(DATE_FORMAT),
            self.days_until_due(today),
            self.renewal_count,
            policy.max_renewals,
        );

        if self.is_overdue(today) {
            summary.push_str(&format!(" [OVERDUE by {} days]", self.days_overdue(today)));
        }

        summary
    }
}

/// Receipt for a returned item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanReturn {
    /// Item as persisted after the return
    pub item: CatalogItem,
    /// The loan that was closed
    pub loan: LoanRecord,
    /// Fine assessed on the return date
    pub fine: f64,
}
