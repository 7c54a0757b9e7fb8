//! Error types for the catalog domain.

use thiserror::Error;

use crate::models::{Availability, ItemId};

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// A rejected field value, tagged with the validator that rejected it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{validator}] {message}")]
pub struct ValidationError {
    /// Stable name of the rejecting validator, e.g. `TitleValidator`.
    pub validator: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(validator: &'static str, message: impl Into<String>) -> Self {
        Self {
            validator,
            message: message.into(),
        }
    }
}

/// Why an operation was refused for the current item or loan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidState {
    #[error("item is not available for loan (current state: {0})")]
    NotAvailable(Availability),

    #[error("no active loan")]
    NoActiveLoan,

    #[error("cannot renew: loan is overdue")]
    Overdue,

    #[error("cannot renew: maximum renewals reached")]
    MaxRenewalsReached,

    #[error("item is not on loan")]
    NotOnLoan,

    #[error("item has an active loan; return it instead of changing availability")]
    ActiveLoanOutstanding,
}

impl InvalidState {
    /// Short label used for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            InvalidState::NotAvailable(_) => "not_available",
            InvalidState::NoActiveLoan => "no_active_loan",
            InvalidState::Overdue => "overdue",
            InvalidState::MaxRenewalsReached => "max_renewals",
            InvalidState::NotOnLoan => "not_on_loan",
            InvalidState::ActiveLoanOutstanding => "active_loan_outstanding",
        }
    }
}

/// Errors that can occur in the catalog domain.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Catalog item not found: {0}")]
    NotFound(ItemId),

    #[error("Invalid state for item {item_id}: {reason}")]
    InvalidState {
        item_id: ItemId,
        #[source]
        reason: InvalidState,
    },

    #[error("Repository error: {0}")]
    Repository(String),
}

impl CatalogError {
    pub fn invalid_state(item_id: ItemId, reason: InvalidState) -> Self {
        CatalogError::InvalidState { item_id, reason }
    }

    /// Short label used for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "validation",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::InvalidState { reason, .. } => reason.label(),
            CatalogError::Repository(_) => "repository",
        }
    }

    /// The state reason, when this is an `InvalidState` error.
    pub fn invalid_state_reason(&self) -> Option<InvalidState> {
        match self {
            CatalogError::InvalidState { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
