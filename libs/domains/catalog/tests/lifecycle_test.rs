//! Integration tests for the loan lifecycle
//!
//! Each test wires the in-memory repository, a fixed clock and real
//! subscribers together and drives the service through its public API.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Days, NaiveDate};
use domain_catalog::*;

struct Harness {
    service: LoanLifecycleService<InMemoryCatalogRepository, Arc<FixedClock>>,
    repository: InMemoryCatalogRepository,
    clock: Arc<FixedClock>,
    notifier: Arc<ChangeNotifier>,
    log: Arc<InventoryLog>,
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn harness() -> Harness {
    let repository = InMemoryCatalogRepository::new();
    let clock = Arc::new(FixedClock::new(start_date()));
    let notifier = Arc::new(ChangeNotifier::new());
    let log = Arc::new(InventoryLog::new());
    notifier.subscribe(log.clone());

    let service = LoanLifecycleService::with_clock(
        repository.clone(),
        Arc::clone(&notifier),
        Arc::clone(&clock),
    );

    Harness {
        service,
        repository,
        clock,
        notifier,
        log,
    }
}

fn add_item(repository: &InMemoryCatalogRepository, title: &str) -> CatalogItem {
    repository
        .save(NewCatalogItem {
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            category: Category::Fiction,
            medium: Medium::Physical,
            availability: Availability::Available,
        })
        .unwrap()
}

fn availability_of(h: &Harness, id: ItemId) -> Availability {
    h.repository.find_by_id(id).unwrap().unwrap().availability
}

// ============================================================================
// Loan
// ============================================================================

#[test]
fn test_loan_available_item() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");

    let record = h.service.loan(item.id, "Alice").unwrap();

    assert_eq!(record.item_id, item.id);
    assert_eq!(record.loan_date, start_date());
    assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap());
    assert_eq!(record.renewal_count, 0);
    assert_eq!(availability_of(&h, item.id), Availability::Loaned);
    assert_eq!(h.service.get_active_loan(item.id), Some(record));

    let entries = h.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].old, Availability::Available);
    assert_eq!(entries[0].new, Availability::Loaned);
}

#[test]
fn test_second_loan_is_rejected_without_notification() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    let err = h.service.loan(item.id, "Bob").unwrap_err();

    assert_eq!(
        err.invalid_state_reason(),
        Some(InvalidState::NotAvailable(Availability::Loaned))
    );
    assert_eq!(h.log.entries().len(), 1);
    assert_eq!(
        h.service.get_active_loan(item.id).unwrap().borrower_name,
        "Alice"
    );
}

#[test]
fn test_loan_unknown_item() {
    let h = harness();
    assert!(matches!(
        h.service.loan(404, "Alice"),
        Err(CatalogError::NotFound(404))
    ));
    assert!(h.log.entries().is_empty());
}

// ============================================================================
// Renew
// ============================================================================

#[test]
fn test_renew_extends_due_date() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    let loaned = h.service.loan(item.id, "Alice").unwrap();

    let renewed = h.service.renew(item.id).unwrap();

    assert_eq!(
        renewed.due_date,
        loaned.due_date.checked_add_days(Days::new(14)).unwrap()
    );
    assert_eq!(renewed.renewal_count, 1);
    assert_eq!(renewed.loan_date, loaned.loan_date);
    assert_eq!(h.service.get_active_loan(item.id), Some(renewed));
    // Availability did not change, so nothing was published
    assert_eq!(h.log.entries().len(), 1);
}

#[test]
fn test_renew_without_loan() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");

    let err = h.service.renew(item.id).unwrap_err();
    assert_eq!(err.invalid_state_reason(), Some(InvalidState::NoActiveLoan));
}

#[test]
fn test_overdue_loan_cannot_be_renewed() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    // 19 days after the loan the item is 5 days past due
    h.clock.advance(19);
    let record = h.service.get_active_loan(item.id).unwrap();

    assert!(h.service.is_overdue(&record));
    assert_eq!(h.service.days_overdue(&record), 5);
    assert_eq!(h.service.days_until_due(&record), -5);
    assert_eq!(h.service.calculate_fine(&record), 2.5);
    assert!(!h.service.can_renew(&record));
    assert_eq!(h.service.loan_status(&record), LoanStatus::Overdue);

    let err = h.service.renew(item.id).unwrap_err();
    assert_eq!(err.invalid_state_reason(), Some(InvalidState::Overdue));
    assert_eq!(h.service.get_active_loan(item.id), Some(record));
}

#[test]
fn test_hand_built_overdue_record() {
    let h = harness();
    let today = h.service.today();
    let record = LoanRecord {
        item_id: 1,
        borrower_name: "Alice".to_string(),
        loan_date: today.checked_sub_days(Days::new(20)).unwrap(),
        due_date: today.checked_sub_days(Days::new(5)).unwrap(),
        renewal_count: 0,
    };

    assert!(h.service.is_overdue(&record));
    assert_eq!(h.service.days_overdue(&record), 5);
    assert_eq!(h.service.calculate_fine(&record), 2.5);
    assert!(!h.service.can_renew(&record));
}

#[test]
fn test_renewal_cap() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    for expected in 1..=3 {
        let renewed = h.service.renew(item.id).unwrap();
        assert_eq!(renewed.renewal_count, expected);
        assert_eq!(h.service.loan_status(&renewed), LoanStatus::Renewed(expected));
    }

    let record = h.service.get_active_loan(item.id).unwrap();
    assert!(!h.service.is_overdue(&record));
    assert!(!h.service.can_renew(&record));

    let err = h.service.renew(item.id).unwrap_err();
    assert_eq!(
        err.invalid_state_reason(),
        Some(InvalidState::MaxRenewalsReached)
    );
    assert_eq!(h.service.get_active_loan(item.id).unwrap().renewal_count, 3);
}

// ============================================================================
// Return
// ============================================================================

#[test]
fn test_loan_then_return() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    let loan = h.service.loan(item.id, "Alice").unwrap();

    let receipt = h.service.return_item(item.id).unwrap();

    assert_eq!(receipt.loan, loan);
    assert_eq!(receipt.fine, 0.0);
    assert_eq!(receipt.item.availability, Availability::Available);
    assert_eq!(availability_of(&h, item.id), Availability::Available);
    assert!(h.service.get_active_loan(item.id).is_none());

    let entries = h.log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].old, Availability::Loaned);
    assert_eq!(entries[1].new, Availability::Available);

    let err = h.service.return_item(item.id).unwrap_err();
    assert_eq!(err.invalid_state_reason(), Some(InvalidState::NotOnLoan));
    assert_eq!(h.log.entries().len(), 2);
}

#[test]
fn test_return_assesses_fine() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    h.clock.advance(24);
    let receipt = h.service.return_item(item.id).unwrap();

    assert_eq!(receipt.fine, 5.0);
    assert_eq!(h.service.total_outstanding_fines(), 0.0);
}

#[test]
fn test_registry_queries() {
    let h = harness();
    let first = add_item(&h.repository, "Dune");
    let second = add_item(&h.repository, "Children of Dune");
    let third = add_item(&h.repository, "Dune Messiah");

    h.service.loan(second.id, "Bob").unwrap();
    h.clock.advance(10);
    h.service.loan(first.id, "Alice").unwrap();
    h.service.loan(third.id, "Carol").unwrap();
    h.clock.advance(7);

    let active: Vec<ItemId> = h
        .service
        .list_active_loans()
        .iter()
        .map(|l| l.item_id)
        .collect();
    assert_eq!(active, vec![first.id, second.id, third.id]);

    let overdue = h.service.list_overdue_loans();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].item_id, second.id);
    assert_eq!(h.service.total_outstanding_fines(), 1.5);
}

// ============================================================================
// Withdrawing items
// ============================================================================

#[test]
fn test_withdraw_refused_until_returned() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    let err = h.service.withdraw_item(item.id).unwrap_err();
    assert_eq!(
        err.invalid_state_reason(),
        Some(InvalidState::ActiveLoanOutstanding)
    );
    assert!(h.repository.find_by_id(item.id).unwrap().is_some());

    h.service.return_item(item.id).unwrap();
    h.service.withdraw_item(item.id).unwrap();

    assert!(h.repository.find_by_id(item.id).unwrap().is_none());
    assert!(matches!(
        h.service.withdraw_item(item.id),
        Err(CatalogError::NotFound(_))
    ));
}

#[test]
fn test_return_clears_loan_of_item_deleted_elsewhere() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    let catalog = CatalogService::new(h.repository.clone());
    catalog.delete_item(item.id).unwrap();
    h.clock.advance(30);

    assert!(matches!(
        h.service.return_item(item.id),
        Err(CatalogError::NotFound(_))
    ));
    assert!(h.service.get_active_loan(item.id).is_none());
    assert!(h.service.list_active_loans().is_empty());
    assert_eq!(h.service.total_outstanding_fines(), 0.0);
    assert_eq!(
        h.service.return_item(item.id).unwrap_err().invalid_state_reason(),
        Some(InvalidState::NotOnLoan)
    );
    // Only the loan was ever published
    assert_eq!(h.log.entries().len(), 1);
}

// ============================================================================
// Manual availability updates
// ============================================================================

#[test]
fn test_update_to_same_state_is_noop() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");

    let unchanged = h.service.update_availability(item.id, "Available").unwrap();

    assert_eq!(unchanged, item);
    assert!(h.log.entries().is_empty());
}

#[test]
fn test_update_persists_and_notifies() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");

    let updated = h.service.update_availability(item.id, "LOANED").unwrap();

    assert_eq!(updated.availability, Availability::Loaned);
    assert_eq!(availability_of(&h, item.id), Availability::Loaned);
    assert_eq!(h.log.entries().len(), 1);
    assert!(h.service.get_active_loan(item.id).is_none());
}

// ============================================================================
// Subscribers
// ============================================================================

#[test]
fn test_subscribe_is_idempotent() {
    let notifier = ChangeNotifier::new();
    let stats = Arc::new(TransitionStatistics::new());

    let first = notifier.subscribe(stats.clone());
    let second = notifier.subscribe(stats.clone());
    assert_eq!(first, second);
    assert_eq!(notifier.count(), 1);

    assert!(notifier.unsubscribe(first));
    assert_eq!(notifier.count(), 0);
}

struct Exploding;

impl AvailabilitySubscriber for Exploding {
    fn name(&self) -> &'static str {
        "Exploding"
    }

    fn on_availability_changed(
        &self,
        _item: &CatalogItem,
        _old: Availability,
        _new: Availability,
    ) -> Result<(), SubscriberError> {
        panic!("subscriber bug");
    }
}

#[test]
fn test_failing_subscribers_do_not_fail_the_operation() {
    let h = harness();
    let email = Arc::new(EmailNotifier::new(""));
    let stats = Arc::new(TransitionStatistics::new());
    h.notifier.subscribe(email.clone());
    h.notifier.subscribe(Arc::new(Exploding));
    h.notifier.subscribe(stats.clone());

    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();
    h.service.return_item(item.id).unwrap();

    assert_eq!(h.log.entries().len(), 2);
    assert_eq!(stats.total_transitions(), 2);
    assert!(email.sent().is_empty());
}

#[test]
fn test_unsubscribed_subscriber_stops_receiving() {
    let h = harness();
    let stats = Arc::new(TransitionStatistics::new());
    let id = h.notifier.subscribe(stats.clone());

    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();
    h.notifier.unsubscribe(id);
    h.service.return_item(item.id).unwrap();

    assert_eq!(stats.total_transitions(), 1);
    assert_eq!(stats.statistics().get("Available → Loaned"), Some(&1));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_loans_on_one_item() {
    let h = harness();
    let id = add_item(&h.repository, "Dune").id;
    let threads = 8;
    let barrier = Barrier::new(threads);

    let results: Vec<CatalogResult<LoanRecord>> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let service = &h.service;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    service.loan(id, &format!("Borrower {i}"))
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err.invalid_state_reason(), Some(InvalidState::NotAvailable(_))));
    }
    assert_eq!(h.log.entries().len(), 1);
    assert_eq!(h.service.list_active_loans().len(), 1);
}

#[test]
fn test_concurrent_loans_on_different_items() {
    let h = harness();
    let items: Vec<CatalogItem> = (0..6)
        .map(|i| add_item(&h.repository, &format!("Volume {i}")))
        .collect();

    thread::scope(|s| {
        for item in &items {
            let service = &h.service;
            s.spawn(move || {
                service.loan(item.id, "Alice").unwrap();
                service.renew(item.id).unwrap();
            });
        }
    });

    assert_eq!(h.service.list_active_loans().len(), items.len());
    assert!(h
        .service
        .list_active_loans()
        .iter()
        .all(|l| l.renewal_count == 1));
    assert_eq!(h.log.entries().len(), items.len());
}

// ============================================================================
// Augmentations
// ============================================================================

#[test]
fn test_describe_loaned_item() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");
    h.service.loan(item.id, "Alice").unwrap();

    let augmented = h.service.describe(item.id).unwrap();

    assert_eq!(
        augmented.description(),
        "Book: 'Dune' by Frank Herbert [Fiction, Physical] [ON LOAN]"
    );
    assert_eq!(
        h.service.additional_info(&augmented),
        "LOAN DETAILS: Borrower: Alice, Loaned: 01/05/2024, Due: 15/05/2024, Days remaining: 14, Renewals: 0/3"
    );
}

#[test]
fn test_augmentations_do_not_touch_lifecycle_state() {
    let h = harness();
    let item = add_item(&h.repository, "Dune");

    let reserved = h.service.reserve(item.id, "Bob", 2).unwrap();
    assert_eq!(reserved.availability(), Availability::Available);
    assert!(!reserved.reservation().unwrap().is_next_in_queue());

    h.service
        .add_to_special_collection(item.id, SpecialCollection::restricted("Rare Books"))
        .unwrap();

    assert_eq!(availability_of(&h, item.id), Availability::Available);
    assert!(h.service.get_active_loan(item.id).is_none());
    assert!(h.log.entries().is_empty());
    // Bundles are not persisted
    assert!(h.service.describe(item.id).unwrap().augmentations.is_empty());
}
