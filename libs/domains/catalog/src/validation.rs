//! Ordered, fail-fast field validation.
//!
//! A [`ValidationPipeline`] runs its validators in insertion order and stops at
//! the first rejection. Pipelines implement [`FieldValidator`] themselves, so a
//! pipeline can be nested inside another one.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use observability::CatalogMetrics;

use crate::error::ValidationError;
use crate::models::{Availability, Category, Medium};

pub const TITLE_MIN_LENGTH: usize = 1;
pub const TITLE_MAX_LENGTH: usize = 255;
pub const AUTHOR_MIN_LENGTH: usize = 2;
pub const AUTHOR_MAX_LENGTH: usize = 255;

static TITLE_FORBIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[<>{}\[\]]").unwrap());

static AUTHOR_ALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s.'-]+$").unwrap());

static AUTHOR_SEPARATORS_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.'\-\s]+$").unwrap());

/// Build a rejection and record it.
pub(crate) fn reject(validator: &'static str, message: impl Into<String>) -> ValidationError {
    let err = ValidationError::new(validator, message);
    debug!(validator, reason = %err.message, "Field rejected");
    CatalogMetrics::record_validation_failure(validator);
    err
}

/// A single step of the title/author validation chain.
pub trait FieldValidator: Send + Sync {
    /// Stable name used in error reporting
    fn name(&self) -> &'static str;

    /// Check the fields this validator owns. `None` means the caller supplied no value.
    fn validate(&self, title: Option<&str>, author: Option<&str>) -> Result<(), ValidationError>;

    /// Names of the leaf validators, in evaluation order
    fn names(&self) -> Vec<&'static str> {
        vec![self.name()]
    }
}

/// Title must be present, non-blank, at most 255 characters and free of `< > { } [ ]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleValidator;

impl TitleValidator {
    pub const NAME: &'static str = "TitleValidator";
}

impl FieldValidator for TitleValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, title: Option<&str>, _author: Option<&str>) -> Result<(), ValidationError> {
        let Some(title) = title else {
            return Err(reject(Self::NAME, "Title cannot be null"));
        };

        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(reject(Self::NAME, "Title cannot be empty or blank"));
        }

        let length = trimmed.chars().count();
        if length < TITLE_MIN_LENGTH {
            return Err(reject(
                Self::NAME,
                format!("Title must be at least {TITLE_MIN_LENGTH} character(s) long"),
            ));
        }
        if length > TITLE_MAX_LENGTH {
            return Err(reject(
                Self::NAME,
                format!("Title cannot exceed {TITLE_MAX_LENGTH} characters"),
            ));
        }

        if TITLE_FORBIDDEN.is_match(trimmed) {
            return Err(reject(
                Self::NAME,
                "Title contains invalid characters: < > { } [ ]",
            ));
        }

        Ok(())
    }
}

/// Author must be 2-255 characters of letters, spaces, dots, hyphens and
/// apostrophes, with at least one letter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorValidator;

impl AuthorValidator {
    pub const NAME: &'static str = "AuthorValidator";
}

impl FieldValidator for AuthorValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, _title: Option<&str>, author: Option<&str>) -> Result<(), ValidationError> {
        let Some(author) = author else {
            return Err(reject(Self::NAME, "Author cannot be null"));
        };

        let trimmed = author.trim();
        if trimmed.is_empty() {
            return Err(reject(Self::NAME, "Author cannot be empty or blank"));
        }

        let length = trimmed.chars().count();
        if length < AUTHOR_MIN_LENGTH {
            return Err(reject(
                Self::NAME,
                format!("Author name must be at least {AUTHOR_MIN_LENGTH} characters long"),
            ));
        }
        if length > AUTHOR_MAX_LENGTH {
            return Err(reject(
                Self::NAME,
                format!("Author name cannot exceed {AUTHOR_MAX_LENGTH} characters"),
            ));
        }

        if !AUTHOR_ALLOWED.is_match(trimmed) {
            return Err(reject(
                Self::NAME,
                "Author name contains invalid characters. Only letters, spaces, dots, hyphens, and apostrophes are allowed",
            ));
        }

        if AUTHOR_SEPARATORS_ONLY.is_match(trimmed) {
            return Err(reject(Self::NAME, "Author name must contain at least one letter"));
        }

        Ok(())
    }
}

/// Error building a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("a validation pipeline needs at least one validator")]
    Empty,
}

/// Ordered chain of validators; the first rejection wins.
#[derive(Clone)]
pub struct ValidationPipeline {
    validators: Vec<Arc<dyn FieldValidator>>,
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("validators", &self.names())
            .finish()
    }
}

/// Builder for [`ValidationPipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    validators: Vec<Arc<dyn FieldValidator>>,
}

impl PipelineBuilder {
    /// Append a validator to the end of the chain
    pub fn then<V: FieldValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append an already shared validator
    pub fn then_shared(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn build(self) -> Result<ValidationPipeline, PipelineError> {
        if self.validators.is_empty() {
            return Err(PipelineError::Empty);
        }
        Ok(ValidationPipeline {
            validators: self.validators,
        })
    }
}

impl ValidationPipeline {
    pub const NAME: &'static str = "ValidationPipeline";

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Title then author. Used to gate item creation.
    pub fn standard() -> Self {
        Self {
            validators: vec![Arc::new(TitleValidator), Arc::new(AuthorValidator)],
        }
    }

    /// Same chain as [`standard`](Self::standard), for basic-field checks
    pub fn basic() -> Self {
        Self::standard()
    }

    pub fn title_only() -> Self {
        Self {
            validators: vec![Arc::new(TitleValidator)],
        }
    }

    pub fn author_only() -> Self {
        Self {
            validators: vec![Arc::new(AuthorValidator)],
        }
    }

    /// Pipeline from an explicit list, in the given order
    pub fn custom(validators: Vec<Arc<dyn FieldValidator>>) -> Result<Self, PipelineError> {
        if validators.is_empty() {
            return Err(PipelineError::Empty);
        }
        Ok(Self { validators })
    }

    /// Run the chain and fold the outcome into a [`ValidationReport`]
    pub fn report(&self, title: Option<&str>, author: Option<&str>) -> ValidationReport {
        match self.validate(title, author) {
            Ok(()) => ValidationReport::passed(),
            Err(err) => ValidationReport::failed(err),
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl FieldValidator for ValidationPipeline {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, title: Option<&str>, author: Option<&str>) -> Result<(), ValidationError> {
        self.validators
            .iter()
            .try_for_each(|v| v.validate(title, author))
    }

    fn names(&self) -> Vec<&'static str> {
        self.validators.iter().flat_map(|v| v.names()).collect()
    }
}

/// Outcome of a validation run, suitable for returning to a caller as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
    pub failed_validator: Option<&'static str>,
}

impl ValidationReport {
    pub fn passed() -> Self {
        Self {
            valid: true,
            message: "Validation successful".to_string(),
            failed_validator: None,
        }
    }

    pub fn failed(err: ValidationError) -> Self {
        Self {
            valid: false,
            message: err.message,
            failed_validator: Some(err.validator),
        }
    }
}

// =============================================================================
// Enumerated fields
// =============================================================================

fn parse_enumerated<T: FromStr>(
    validator: &'static str,
    field: &str,
    value: Option<&str>,
    allowed: [&str; 2],
) -> Result<T, ValidationError> {
    let Some(value) = value else {
        return Err(reject(validator, format!("{field} cannot be null")));
    };

    if value.trim().is_empty() {
        return Err(reject(validator, format!("{field} cannot be empty")));
    }

    value.trim().parse().map_err(|_| {
        reject(
            validator,
            format!("{field} must be either '{}' or '{}'", allowed[0], allowed[1]),
        )
    })
}

/// Accepts `Fiction` or `NonFiction`, case-insensitive
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryValidator;

impl CategoryValidator {
    pub const NAME: &'static str = "CategoryValidator";

    pub fn validate(&self, value: Option<&str>) -> Result<Category, ValidationError> {
        parse_enumerated(Self::NAME, "Category", value, ["Fiction", "NonFiction"])
    }
}

/// Accepts `Physical` or `Digital`, case-insensitive
#[derive(Debug, Clone, Copy, Default)]
pub struct MediumValidator;

impl MediumValidator {
    pub const NAME: &'static str = "MediumValidator";

    pub fn validate(&self, value: Option<&str>) -> Result<Medium, ValidationError> {
        parse_enumerated(Self::NAME, "Medium", value, ["Physical", "Digital"])
    }
}

/// Accepts `Available` or `Loaned`, case-insensitive
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityValidator;

impl AvailabilityValidator {
    pub const NAME: &'static str = "AvailabilityValidator";

    pub fn validate(&self, value: Option<&str>) -> Result<Availability, ValidationError> {
        parse_enumerated(Self::NAME, "Availability", value, ["Available", "Loaned"])
    }
}

pub fn validate_category(value: &str) -> Result<Category, ValidationError> {
    CategoryValidator.validate(Some(value))
}

pub fn validate_medium(value: &str) -> Result<Medium, ValidationError> {
    MediumValidator.validate(Some(value))
}

pub fn validate_availability(value: &str) -> Result<Availability, ValidationError> {
    AvailabilityValidator.validate(Some(value))
}

// =============================================================================
// Catalog of validators
// =============================================================================

/// Description of one validator and its rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorInfo {
    pub name: &'static str,
    pub validates: &'static str,
    pub rules: Vec<&'static str>,
}

/// All validators known to the catalog, title and author first
pub fn validator_catalog() -> Vec<ValidatorInfo> {
    vec![
        ValidatorInfo {
            name: TitleValidator::NAME,
            validates: "title",
            rules: vec![
                "Cannot be null",
                "Cannot be empty or blank",
                "Length between 1 and 255 characters",
                "Cannot contain < > { } [ ]",
            ],
        },
        ValidatorInfo {
            name: AuthorValidator::NAME,
            validates: "author",
            rules: vec![
                "Cannot be null",
                "Cannot be empty or blank",
                "Length between 2 and 255 characters",
                "Only letters, spaces, dots, hyphens and apostrophes",
                "Must contain at least one letter",
            ],
        },
        ValidatorInfo {
            name: CategoryValidator::NAME,
            validates: "category",
            rules: vec!["Must be 'Fiction' or 'NonFiction' (case-insensitive)"],
        },
        ValidatorInfo {
            name: MediumValidator::NAME,
            validates: "medium",
            rules: vec!["Must be 'Physical' or 'Digital' (case-insensitive)"],
        },
        ValidatorInfo {
            name: AvailabilityValidator::NAME,
            validates: "availability",
            rules: vec!["Must be 'Available' or 'Loaned' (case-insensitive)"],
        },
    ]
}
