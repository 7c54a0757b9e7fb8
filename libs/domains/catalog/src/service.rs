use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogItem, CatalogItemDraft, ItemId, NewCatalogItem};
use crate::repository::CatalogRepository;
use crate::validation::{
    AvailabilityValidator, CategoryValidator, FieldValidator, MediumValidator, ValidationPipeline,
    ValidationReport,
};

/// Service layer for catalog item management
#[derive(Clone)]
pub struct CatalogService<R: CatalogRepository> {
    repository: Arc<R>,
    pipeline: ValidationPipeline,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_pipeline(repository, ValidationPipeline::standard())
    }

    /// Use a different title/author chain in front of the repository
    pub fn with_pipeline(repository: R, pipeline: ValidationPipeline) -> Self {
        Self {
            repository: Arc::new(repository),
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }

    /// Validate every field of `draft` and persist it
    #[instrument(skip(self, draft), fields(title = ?draft.title))]
    pub fn create_item(&self, draft: CatalogItemDraft) -> CatalogResult<CatalogItem> {
        self.pipeline
            .validate(draft.title.as_deref(), draft.author.as_deref())?;

        let category = CategoryValidator.validate(draft.category.as_deref())?;
        let medium = MediumValidator.validate(draft.medium.as_deref())?;
        let availability = AvailabilityValidator.validate(draft.availability.as_deref())?;

        let title = draft.title.unwrap_or_default().trim().to_string();
        let author = draft.author.unwrap_or_default().trim().to_string();

        let item = self.repository.save(NewCatalogItem {
            title,
            author,
            category,
            medium,
            availability,
        })?;

        info!(item_id = %item.id, "Created catalog item");
        Ok(item)
    }

    /// Get an item by ID
    #[instrument(skip(self))]
    pub fn get_item(&self, id: ItemId) -> CatalogResult<CatalogItem> {
        self.repository
            .find_by_id(id)?
            .ok_or(CatalogError::NotFound(id))
    }

    /// List every item, ordered by id
    pub fn list_items(&self) -> CatalogResult<Vec<CatalogItem>> {
        self.repository.find_all()
    }

    /// Delete an item without consulting the loan registry. Prefer
    /// `LoanLifecycleService::withdraw_item`, which refuses while the item is on loan.
    #[instrument(skip(self))]
    pub fn delete_item(&self, id: ItemId) -> CatalogResult<()> {
        let deleted = self.repository.delete_by_id(id)?;

        if !deleted {
            return Err(CatalogError::NotFound(id));
        }

        info!(item_id = %id, "Deleted catalog item");
        Ok(())
    }

    /// Re-check a stored item's title and author
    pub fn validate_item(&self, item: &CatalogItem) -> ValidationReport {
        self.pipeline
            .report(Some(item.title.as_str()), Some(item.author.as_str()))
    }

    /// One report per item, in input order
    pub fn validate_items(&self, items: &[CatalogItem]) -> Vec<ValidationReport> {
        items.iter().map(|item| self.validate_item(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, Category, Medium};
    use crate::repository::MockCatalogRepository;

    fn draft() -> CatalogItemDraft {
        CatalogItemDraft::new("  Dune ", "Frank Herbert", "fiction", "PHYSICAL", "Available")
    }

    #[test]
    fn test_create_item_normalizes_fields() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo
            .expect_save()
            .withf(|input| {
                input.title == "Dune"
                    && input.category == Category::Fiction
                    && input.medium == Medium::Physical
                    && input.availability == Availability::Available
            })
            .times(1)
            .returning(|input| Ok(CatalogItem::new(1, input)));

        let service = CatalogService::new(mock_repo);
        let item = service.create_item(draft()).unwrap();

        assert_eq!(item.id, 1);
        assert_eq!(item.title, "Dune");
    }

    #[test]
    fn test_create_item_rejects_before_saving() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo.expect_save().never();

        let service = CatalogService::new(mock_repo);

        let bad_author = CatalogItemDraft {
            author: Some("Robert@Martin".to_string()),
            ..draft()
        };
        let err = service.create_item(bad_author).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ref v) if v.validator == "AuthorValidator"));

        let bad_medium = CatalogItemDraft {
            medium: Some("Scroll".to_string()),
            ..draft()
        };
        let err = service.create_item(bad_medium).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ref v) if v.validator == "MediumValidator"));
    }

    #[test]
    fn test_create_item_missing_field() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo.expect_save().never();
        let service = CatalogService::new(mock_repo);

        let err = service
            .create_item(CatalogItemDraft {
                category: None,
                ..draft()
            })
            .unwrap_err();

        match err {
            CatalogError::Validation(v) => {
                assert_eq!(v.validator, "CategoryValidator");
                assert_eq!(v.message, "Category cannot be null");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_repository_error_propagates() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo
            .expect_save()
            .returning(|_| Err(CatalogError::Repository("unique violation".to_string())));

        let service = CatalogService::new(mock_repo);
        assert!(matches!(
            service.create_item(draft()),
            Err(CatalogError::Repository(_))
        ));
    }

    #[test]
    fn test_get_and_delete_missing() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo.expect_find_by_id().returning(|_| Ok(None));
        mock_repo.expect_delete_by_id().returning(|_| Ok(false));

        let service = CatalogService::new(mock_repo);
        assert!(matches!(service.get_item(8), Err(CatalogError::NotFound(8))));
        assert!(matches!(service.delete_item(8), Err(CatalogError::NotFound(8))));
    }

    #[test]
    fn test_title_only_pipeline_skips_author_rules() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo
            .expect_save()
            .returning(|input| Ok(CatalogItem::new(2, input)));

        let service = CatalogService::with_pipeline(mock_repo, ValidationPipeline::title_only());
        let item = service
            .create_item(CatalogItemDraft {
                author: Some("X".to_string()),
                ..draft()
            })
            .unwrap();
        assert_eq!(item.author, "X");
    }

    #[test]
    fn test_validate_items() {
        let service = CatalogService::new(MockCatalogRepository::new());
        let good = CatalogItem::new(
            1,
            NewCatalogItem {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                category: Category::Fiction,
                medium: Medium::Physical,
                availability: Availability::Available,
            },
        );
        let bad = CatalogItem {
            title: "<script>".to_string(),
            ..good.clone()
        };

        let reports = service.validate_items(&[good, bad]);
        assert!(reports[0].valid);
        assert!(!reports[1].valid);
        assert_eq!(reports[1].failed_validator, Some("TitleValidator"));
    }
}
