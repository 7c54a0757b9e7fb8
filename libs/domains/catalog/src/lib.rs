//! Catalog Domain
//!
//! Catalog items, their validation, and the loan lifecycle that moves them
//! between `Available` and `Loaned`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────┐
//! │  CatalogService  │      │ LoanLifecycleService │  ← loan / renew / return,
//! └────────┬─────────┘      └───┬──────────────┬───┘    active-loan registry
//!          │                    │              │
//! ┌────────▼─────────┐          │      ┌───────▼────────┐
//! │ValidationPipeline│          │      │ ChangeNotifier │  ← fan-out to subscribers
//! └────────┬─────────┘          │      └────────────────┘
//!          │                    │
//! ┌────────▼────────────────────▼──┐
//! │       CatalogRepository        │  ← Data access (trait + in-memory impl)
//! └────────────────┬───────────────┘
//!                  │
//! ┌────────────────▼───────────────┐
//! │ Models / LoanRecord / Bundles  │  ← Entities, loan records, augmentations
//! └────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use domain_catalog::{
//!     CatalogItemDraft, CatalogService, ChangeNotifier, InMemoryCatalogRepository,
//!     LoanLifecycleService, TransitionStatistics,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = InMemoryCatalogRepository::new();
//! let catalog = CatalogService::new(repository.clone());
//!
//! let notifier = Arc::new(ChangeNotifier::new());
//! let stats = Arc::new(TransitionStatistics::new());
//! notifier.subscribe(stats.clone());
//!
//! let lifecycle = LoanLifecycleService::new(repository, notifier);
//!
//! let item = catalog.create_item(CatalogItemDraft::new(
//!     "The Left Hand of Darkness",
//!     "Ursula K. Le Guin",
//!     "Fiction",
//!     "Physical",
//!     "Available",
//! ))?;
//!
//! lifecycle.loan(item.id, "Alice")?;
//! lifecycle.renew(item.id)?;
//! let receipt = lifecycle.return_item(item.id)?;
//!
//! assert_eq!(receipt.fine, 0.0);
//! assert_eq!(stats.total_transitions(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod augmentation;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loan;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod service;
pub mod subscribers;
pub mod validation;

// Re-export commonly used types
pub use augmentation::{Augmentation, AugmentedItem, Reservation, SpecialCollection};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LoanPolicy;
pub use error::{CatalogError, CatalogResult, InvalidState, ValidationError};
pub use lifecycle::LoanLifecycleService;
pub use loan::{LoanRecord, LoanReturn, LoanStatus};
pub use models::{
    Availability, CatalogItem, CatalogItemDraft, Category, ItemId, Medium, NewCatalogItem,
};
pub use notifier::{
    AvailabilitySubscriber, ChangeNotifier, DeliveryReport, SubscriberError, SubscriptionId,
};
pub use repository::{CatalogRepository, InMemoryCatalogRepository};
pub use service::CatalogService;
pub use subscribers::{EmailNotifier, InventoryEntry, InventoryLog, TransitionStatistics};
pub use validation::{
    validate_availability, validate_category, validate_medium, validator_catalog,
    AuthorValidator, AvailabilityValidator, CategoryValidator, FieldValidator, MediumValidator,
    PipelineError, TitleValidator, ValidationPipeline, ValidationReport, ValidatorInfo,
};

// Re-export so callers can load a LoanPolicy without naming core_config
pub use core_config::FromEnv;
