use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogItem, ItemId, NewCatalogItem};

/// Repository trait for catalog item persistence
///
/// All calls are synchronous. Implementations report storage failures as
/// [`CatalogError::Repository`]; the domain never retries them.
#[cfg_attr(test, mockall::automock)]
pub trait CatalogRepository: Send + Sync {
    /// List every item, ordered by id
    fn find_all(&self) -> CatalogResult<Vec<CatalogItem>>;

    /// Get an item by ID
    fn find_by_id(&self, id: ItemId) -> CatalogResult<Option<CatalogItem>>;

    /// Persist a new item and assign its ID
    fn save(&self, input: NewCatalogItem) -> CatalogResult<CatalogItem>;

    /// Replace an existing item
    fn update(&self, item: CatalogItem) -> CatalogResult<CatalogItem>;

    /// Delete an item by ID
    fn delete_by_id(&self, id: ItemId) -> CatalogResult<bool>;
}

/// In-memory implementation of CatalogRepository (for development/testing)
#[derive(Debug, Clone)]
pub struct InMemoryCatalogRepository {
    items: Arc<RwLock<BTreeMap<ItemId, CatalogItem>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryCatalogRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl CatalogRepository for InMemoryCatalogRepository {
    fn find_all(&self) -> CatalogResult<Vec<CatalogItem>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.values().cloned().collect())
    }

    fn find_by_id(&self, id: ItemId) -> CatalogResult<Option<CatalogItem>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(&id).cloned())
    }

    fn save(&self, input: NewCatalogItem) -> CatalogResult<CatalogItem> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = CatalogItem::new(id, input);

        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(id, item.clone());

        tracing::debug!(item_id = %id, "Saved catalog item");
        Ok(item)
    }

    fn update(&self, item: CatalogItem) -> CatalogResult<CatalogItem> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);

        let stored = items
            .get_mut(&item.id)
            .ok_or(CatalogError::NotFound(item.id))?;
        *stored = item.clone();

        tracing::debug!(item_id = %item.id, "Updated catalog item");
        Ok(item)
    }

    fn delete_by_id(&self, id: ItemId) -> CatalogResult<bool> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);

        if items.remove(&id).is_some() {
            tracing::debug!(item_id = %id, "Deleted catalog item");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
