//! Loan lifecycle: loan, renew, return and manual availability changes.
//!
//! The service owns the active-loan registry, which is the single source of
//! truth for "is item X on loan". State-changing operations on one item are
//! serialized by a per-item lock and always run in the same order:
//!
//! 1. persist the new availability through the repository,
//! 2. update the registry,
//! 3. fan the transition out to subscribers.
//!
//! A repository failure therefore leaves both the registry and the
//! subscribers untouched. Fan-out happens while the item lock is held, so
//! subscribers observe the transitions of one item in order and must not call
//! back into the service for that same item.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use observability::CatalogMetrics;

use crate::augmentation::{Augmentation, AugmentedItem, Reservation, SpecialCollection};
use crate::clock::{Clock, SystemClock};
use crate::config::LoanPolicy;
use crate::error::{CatalogError, CatalogResult, InvalidState};
use crate::loan::{LoanRecord, LoanReturn, LoanStatus};
use crate::models::{Availability, CatalogItem, ItemId};
use crate::notifier::ChangeNotifier;
use crate::repository::CatalogRepository;
use crate::validation::{reject, validate_availability};

const BORROWER_VALIDATOR: &str = "BorrowerValidator";
const RESERVATION_VALIDATOR: &str = "ReservationValidator";

fn rejected(validator: &'static str, message: &str) -> CatalogError {
    reject(validator, message).into()
}

/// Service layer for the loan lifecycle
pub struct LoanLifecycleService<R: CatalogRepository, C: Clock = SystemClock> {
    repository: Arc<R>,
    notifier: Arc<ChangeNotifier>,
    clock: C,
    policy: LoanPolicy,
    active_loans: RwLock<HashMap<ItemId, LoanRecord>>,
    item_locks: Mutex<HashMap<ItemId, Arc<Mutex<()>>>>,
}

impl<R: CatalogRepository> LoanLifecycleService<R, SystemClock> {
    pub fn new(repository: R, notifier: Arc<ChangeNotifier>) -> Self {
        Self::with_clock(repository, notifier, SystemClock)
    }
}

impl<R: CatalogRepository, C: Clock> LoanLifecycleService<R, C> {
    pub fn with_clock(repository: R, notifier: Arc<ChangeNotifier>, clock: C) -> Self {
        Self {
            repository: Arc::new(repository),
            notifier,
            clock,
            policy: LoanPolicy::default(),
            active_loans: RwLock::new(HashMap::new()),
            item_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the default lending rules
    pub fn with_policy(mut self, policy: LoanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn item_lock(&self, item_id: ItemId) -> Arc<Mutex<()>> {
        let mut locks = self.item_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(item_id).or_default())
    }

    /// Run `f` while holding the lock for `item_id`, then drop the lock entry
    /// if no other caller is holding or waiting on it.
    fn with_item_lock<T>(&self, item_id: ItemId, f: impl FnOnce() -> T) -> T {
        let lock = self.item_lock(item_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones are only handed out under the map lock, so a count of two
        // (map entry + ours) means nobody else can be queued on this item.
        let mut locks = self.item_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&item_id);
        }
        result
    }

    fn find_item(&self, item_id: ItemId) -> CatalogResult<CatalogItem> {
        self.repository
            .find_by_id(item_id)?
            .ok_or(CatalogError::NotFound(item_id))
    }

    fn registered_loan(&self, item_id: ItemId) -> Option<LoanRecord> {
        self.active_loans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&item_id)
            .cloned()
    }

    fn register_loan(&self, record: LoanRecord) {
        let mut loans = self.active_loans.write().unwrap_or_else(PoisonError::into_inner);
        loans.insert(record.item_id, record);
        CatalogMetrics::set_active_loans(loans.len());
    }

    fn unregister_loan(&self, item_id: ItemId) {
        let mut loans = self.active_loans.write().unwrap_or_else(PoisonError::into_inner);
        loans.remove(&item_id);
        CatalogMetrics::set_active_loans(loans.len());
    }

    fn publish(&self, item: &CatalogItem, old: Availability, new: Availability) {
        let (from, to): (&'static str, &'static str) = (old.into(), new.into());
        CatalogMetrics::record_availability_change(from, to);
        let report = self.notifier.notify_all(item, old, new);
        debug!(
            item_id = %item.id,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Availability change published"
        );
    }

    fn open_loan(
        &self,
        item_id: ItemId,
        borrower_name: &str,
    ) -> CatalogResult<(CatalogItem, LoanRecord)> {
        let borrower_name = borrower_name.trim();
        if borrower_name.is_empty() {
            return Err(rejected(
                BORROWER_VALIDATOR,
                "Borrower name cannot be empty or blank",
            ));
        }

        self.with_item_lock(item_id, || self.open_loan_locked(item_id, borrower_name))
    }

    fn open_loan_locked(
        &self,
        item_id: ItemId,
        borrower_name: &str,
    ) -> CatalogResult<(CatalogItem, LoanRecord)> {
        let item = self.find_item(item_id)?;

        if self.registered_loan(item_id).is_some() {
            return Err(CatalogError::invalid_state(
                item_id,
                InvalidState::NotAvailable(Availability::Loaned),
            ));
        }
        if !item.is_available() {
            return Err(CatalogError::invalid_state(
                item_id,
                InvalidState::NotAvailable(item.availability),
            ));
        }

        let record = LoanRecord::open(item_id, borrower_name, self.today(), &self.policy);
        let updated = self
            .repository
            .update(item.with_availability(Availability::Loaned))?;
        self.register_loan(record.clone());

        CatalogMetrics::record_loan_started();
        info!(
            item_id = %item_id,
            borrower = %record.borrower_name,
            due_date = %record.due_date,
            "Item loaned"
        );

        self.publish(&updated, Availability::Available, Availability::Loaned);

        Ok((updated, record))
    }

    fn renew_locked(&self, item_id: ItemId) -> CatalogResult<LoanRecord> {
        let record = self
            .registered_loan(item_id)
            .ok_or_else(|| CatalogError::invalid_state(item_id, InvalidState::NoActiveLoan))?;

        if record.is_overdue(self.today()) {
            return Err(CatalogError::invalid_state(item_id, InvalidState::Overdue));
        }
        if record.renewal_count >= self.policy.max_renewals {
            return Err(CatalogError::invalid_state(
                item_id,
                InvalidState::MaxRenewalsReached,
            ));
        }

        let renewed = record.renewed(&self.policy);
        self.register_loan(renewed.clone());
        Ok(renewed)
    }

    fn return_locked(&self, item_id: ItemId) -> CatalogResult<LoanReturn> {
        let loan = self
            .registered_loan(item_id)
            .ok_or_else(|| CatalogError::invalid_state(item_id, InvalidState::NotOnLoan))?;

        let item = match self.repository.find_by_id(item_id)? {
            Some(item) => item,
            None => {
                // Deleted without going through withdraw_item
                self.unregister_loan(item_id);
                warn!(
                    item_id = %item_id,
                    borrower = %loan.borrower_name,
                    "Dropped loan for deleted item"
                );
                return Err(CatalogError::NotFound(item_id));
            }
        };

        let fine = loan.calculate_fine(self.today(), &self.policy);
        let updated = self
            .repository
            .update(item.with_availability(Availability::Available))?;
        self.unregister_loan(item_id);

        Ok(LoanReturn {
            item: updated,
            loan,
            fine,
        })
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Loan an available item to `borrower_name`
    #[instrument(skip(self))]
    pub fn loan(&self, item_id: ItemId, borrower_name: &str) -> CatalogResult<LoanRecord> {
        self.open_loan(item_id, borrower_name)
            .map(|(_, record)| record)
            .inspect_err(|e| CatalogMetrics::record_loan_rejected(e.label()))
    }

    /// Extend the active loan by one loan period
    #[instrument(skip(self))]
    pub fn renew(&self, item_id: ItemId) -> CatalogResult<LoanRecord> {
        let renewed = self
            .with_item_lock(item_id, || self.renew_locked(item_id))
            .inspect_err(|e| CatalogMetrics::record_renewal_rejected(e.label()))?;

        CatalogMetrics::record_renewal(renewed.renewal_count);
        info!(
            item_id = %item_id,
            due_date = %renewed.due_date,
            renewal_count = renewed.renewal_count,
            "Loan renewed"
        );
        Ok(renewed)
    }

    /// Close the active loan and make the item available again
    #[instrument(skip(self))]
    pub fn return_item(&self, item_id: ItemId) -> CatalogResult<LoanReturn> {
        self.with_item_lock(item_id, || -> CatalogResult<LoanReturn> {
            let receipt = self
                .return_locked(item_id)
                .inspect_err(|e| CatalogMetrics::record_return_rejected(e.label()))?;

            CatalogMetrics::record_return(receipt.fine);
            info!(
                item_id = %item_id,
                borrower = %receipt.loan.borrower_name,
                fine = receipt.fine,
                "Item returned"
            );

            self.publish(&receipt.item, Availability::Loaned, Availability::Available);
            Ok(receipt)
        })
    }

    /// Set availability directly from a raw state name.
    ///
    /// Setting the current state again is a no-op. Moving an item with an
    /// active loan back to `Available` is refused; use [`return_item`](Self::return_item).
    #[instrument(skip(self))]
    pub fn update_availability(
        &self,
        item_id: ItemId,
        new_availability: &str,
    ) -> CatalogResult<CatalogItem> {
        let new = validate_availability(new_availability)?;
        self.with_item_lock(item_id, || self.update_availability_locked(item_id, new))
    }

    fn update_availability_locked(
        &self,
        item_id: ItemId,
        new: Availability,
    ) -> CatalogResult<CatalogItem> {
        let item = self.find_item(item_id)?;
        let old = item.availability;

        if old == new {
            debug!(item_id = %item_id, availability = %new, "Availability unchanged");
            return Ok(item);
        }

        if new == Availability::Available && self.registered_loan(item_id).is_some() {
            return Err(CatalogError::invalid_state(
                item_id,
                InvalidState::ActiveLoanOutstanding,
            ));
        }

        let updated = self.repository.update(item.with_availability(new))?;
        info!(item_id = %item_id, %old, %new, "Availability updated");

        self.publish(&updated, old, new);
        Ok(updated)
    }

    /// Delete an item from the catalog. Refused while the item is on loan.
    #[instrument(skip(self))]
    pub fn withdraw_item(&self, item_id: ItemId) -> CatalogResult<()> {
        self.with_item_lock(item_id, || -> CatalogResult<()> {
            if self.registered_loan(item_id).is_some() {
                return Err(CatalogError::invalid_state(
                    item_id,
                    InvalidState::ActiveLoanOutstanding,
                ));
            }

            if !self.repository.delete_by_id(item_id)? {
                return Err(CatalogError::NotFound(item_id));
            }

            info!(item_id = %item_id, "Withdrew catalog item");
            Ok(())
        })
    }

    // =========================================================================
    // Registry queries
    // =========================================================================

    pub fn get_active_loan(&self, item_id: ItemId) -> Option<LoanRecord> {
        self.registered_loan(item_id)
    }

    /// Active loans ordered by item id
    pub fn list_active_loans(&self) -> Vec<LoanRecord> {
        let mut loans: Vec<LoanRecord> = self
            .active_loans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.item_id);
        loans
    }

    pub fn list_overdue_loans(&self) -> Vec<LoanRecord> {
        let today = self.today();
        self.list_active_loans()
            .into_iter()
            .filter(|l| l.is_overdue(today))
            .collect()
    }

    /// Sum of the fines accrued so far on every active loan
    pub fn total_outstanding_fines(&self) -> f64 {
        let today = self.today();
        self.list_active_loans()
            .iter()
            .map(|l| l.calculate_fine(today, &self.policy))
            .sum()
    }

    // =========================================================================
    // Per-record arithmetic against the service clock and policy
    // =========================================================================

    pub fn is_overdue(&self, record: &LoanRecord) -> bool {
        record.is_overdue(self.today())
    }

    pub fn days_overdue(&self, record: &LoanRecord) -> i64 {
        record.days_overdue(self.today())
    }

    pub fn days_until_due(&self, record: &LoanRecord) -> i64 {
        record.days_until_due(self.today())
    }

    pub fn can_renew(&self, record: &LoanRecord) -> bool {
        record.can_renew(self.today(), &self.policy)
    }

    pub fn calculate_fine(&self, record: &LoanRecord) -> f64 {
        record.calculate_fine(self.today(), &self.policy)
    }

    pub fn loan_status(&self, record: &LoanRecord) -> LoanStatus {
        record.status(self.today())
    }

    // =========================================================================
    // Augmentations
    // =========================================================================

    /// The item with its active loan attached, if any
    #[instrument(skip(self))]
    pub fn describe(&self, item_id: ItemId) -> CatalogResult<AugmentedItem> {
        let item = self.find_item(item_id)?;
        let augmented = AugmentedItem::new(item);

        Ok(match self.registered_loan(item_id) {
            Some(loan) => augmented.with(Augmentation::Loan(loan)),
            None => augmented,
        })
    }

    /// Additional-info line for `augmented`, evaluated today
    pub fn additional_info(&self, augmented: &AugmentedItem) -> String {
        augmented.additional_info(self.today(), &self.policy)
    }

    /// Attach a hold to the item. Holds are presentation only and not stored.
    #[instrument(skip(self))]
    pub fn reserve(
        &self,
        item_id: ItemId,
        reserved_by: &str,
        queue_position: u32,
    ) -> CatalogResult<AugmentedItem> {
        let reserved_by = reserved_by.trim();
        if reserved_by.is_empty() {
            return Err(rejected(
                RESERVATION_VALIDATOR,
                "Reserved-by name cannot be empty or blank",
            ));
        }
        if queue_position == 0 {
            return Err(rejected(
                RESERVATION_VALIDATOR,
                "Queue position must be at least 1",
            ));
        }

        let augmented = self.describe(item_id)?;
        Ok(augmented.with(Augmentation::Reservation(Reservation::new(
            reserved_by,
            queue_position,
        ))))
    }

    #[instrument(skip(self))]
    pub fn add_to_special_collection(
        &self,
        item_id: ItemId,
        collection: SpecialCollection,
    ) -> CatalogResult<AugmentedItem> {
        let augmented = self.describe(item_id)?;
        Ok(augmented.with(Augmentation::SpecialCollection(collection)))
    }

    /// Loan the item and present it as part of a restricted special collection
    #[instrument(skip(self))]
    pub fn loan_with_special_collection(
        &self,
        item_id: ItemId,
        borrower_name: &str,
        collection_name: &str,
    ) -> CatalogResult<AugmentedItem> {
        let (item, record) = self
            .open_loan(item_id, borrower_name)
            .inspect_err(|e| CatalogMetrics::record_loan_rejected(e.label()))?;

        Ok(AugmentedItem::new(item)
            .with(Augmentation::Loan(record))
            .with(Augmentation::SpecialCollection(SpecialCollection::restricted(
                collection_name,
            ))))
    }
}
