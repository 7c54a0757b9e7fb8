use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Repository-assigned identifier of a catalog item
pub type ItemId = i64;

/// Literary category of a catalog item
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    Fiction,
    NonFiction,
}

/// Physical or digital copy
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Medium {
    Physical,
    Digital,
}

/// Whether an item can currently be loaned
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Availability {
    /// On the shelf (initial state)
    #[default]
    Available,
    /// Out with a borrower
    Loaned,
}

/// Catalog item entity - a book held by the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Identifier assigned by the repository on save
    pub id: ItemId,
    pub title: String,
    pub author: String,
    pub category: Category,
    pub medium: Medium,
    pub availability: Availability,
}

/// DTO for an item that passed validation and is ready to be saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub title: String,
    pub author: String,
    pub category: Category,
    pub medium: Medium,
    #[serde(default)]
    pub availability: Availability,
}

/// Raw field values as delivered by a caller, before validation.
///
/// Every field is optional so that a missing value can be reported by the
/// validator that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemDraft {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub medium: Option<String>,
    pub availability: Option<String>,
}

impl CatalogItemDraft {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        medium: impl Into<String>,
        availability: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            author: Some(author.into()),
            category: Some(category.into()),
            medium: Some(medium.into()),
            availability: Some(availability.into()),
        }
    }
}

impl CatalogItem {
    /// Create a catalog item from a validated DTO and a repository-assigned id
    pub fn new(id: ItemId, input: NewCatalogItem) -> Self {
        Self {
            id,
            title: input.title,
            author: input.author,
            category: input.category,
            medium: input.medium,
            availability: input.availability,
        }
    }

    /// Copy of this item with a different availability
    pub fn with_availability(&self, availability: Availability) -> Self {
        Self {
            availability,
            ..self.clone()
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    /// Base description, e.g. `Book: 'Dune' by Frank Herbert [Fiction, Physical]`
    pub fn description(&self) -> String {
        format!(
            "Book: '{}' by {} [{}, {}]",
            self.title, self.author, self.category, self.medium
        )
    }
}
