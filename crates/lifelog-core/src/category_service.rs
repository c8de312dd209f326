//! Category creation, listing, and optimistic soft-delete/restore.

use std::sync::Arc;

use uuid::Uuid;

use lifelog_domain::{normalize_name, Category, CategoryKind, CategoryTransitionError};

use crate::{storage::LedgerStore, CoreError, CoreResult};

#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn LedgerStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Creates a category, enforcing name uniqueness per owner and kind among active categories.
    pub async fn create(
        &self,
        owner_id: Uuid,
        name: &str,
        kind: CategoryKind,
    ) -> CoreResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("category name cannot be empty".into()));
        }
        let existing = self.list_all(owner_id).await?;
        validate_name(&existing, None, name, kind)?;
        let category = Category::new(owner_id, name, kind);
        self.store
            .insert_category(&category)
            .await
            .map_err(CoreError::write("create category"))?;
        tracing::debug!(category_id = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    /// Returns the active category with this name and kind, creating it on first use.
    pub async fn find_or_create(
        &self,
        owner_id: Uuid,
        name: &str,
        kind: CategoryKind,
    ) -> CoreResult<Category> {
        let normalized = normalize_name(name);
        let existing = self
            .list_active(owner_id)
            .await?
            .into_iter()
            .find(|c| c.kind == kind && c.normalized_name() == normalized);
        match existing {
            Some(category) => Ok(category),
            None => self.create(owner_id, name, kind).await,
        }
    }

    /// Every category including soft-deleted ones, for historical display.
    pub async fn list_all(&self, owner_id: Uuid) -> CoreResult<Vec<Category>> {
        self.store
            .list_categories(owner_id)
            .await
            .map_err(CoreError::read("load categories"))
    }

    /// Categories offered by new-entry pickers.
    pub async fn list_active(&self, owner_id: Uuid) -> CoreResult<Vec<Category>> {
        let mut categories = self.list_all(owner_id).await?;
        categories.retain(|c| !c.is_deleted());
        Ok(categories)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Category> {
        self.store
            .get_category(id)
            .await
            .map_err(CoreError::read("load category"))?
            .ok_or(CoreError::CategoryNotFound(id))
    }

    /// Loads an in-memory view that supports optimistic soft-delete and restore.
    pub async fn view(&self, owner_id: Uuid) -> CoreResult<CategoryView> {
        let categories = self.list_all(owner_id).await?;
        Ok(CategoryView {
            owner_id,
            categories,
            service: self.clone(),
        })
    }
}

fn validate_name(
    categories: &[Category],
    exclude: Option<Uuid>,
    candidate: &str,
    kind: CategoryKind,
) -> CoreResult<()> {
    let normalized = normalize_name(candidate);
    let duplicate = categories.iter().any(|category| {
        !category.is_deleted()
            && category.kind == kind
            && category.normalized_name() == normalized
            && exclude.map_or(true, |id| category.id != id)
    });
    if duplicate {
        Err(CoreError::DuplicateCategory(candidate.to_string()))
    } else {
        Ok(())
    }
}

/// Local copy of an owner's categories.
///
/// State changes are applied here first, then committed. A failed commit re-fetches
/// the categories from storage; if that also fails the last-known-good copy is restored.
pub struct CategoryView {
    owner_id: Uuid,
    categories: Vec<Category>,
    service: CategoryService,
}

impl CategoryView {
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn active(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|c| !c.is_deleted())
    }

    pub fn get(&self, id: Uuid) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub async fn soft_delete(&mut self, id: Uuid) -> CoreResult<()> {
        self.transition(id, "delete category", Category::delete)
            .await
    }

    pub async fn restore(&mut self, id: Uuid) -> CoreResult<()> {
        let category = self.get(id).ok_or(CoreError::CategoryNotFound(id))?;
        validate_name(&self.categories, Some(id), &category.name, category.kind)?;
        self.transition(id, "restore category", Category::restore)
            .await
    }

    /// Replaces the local copy with what storage currently holds.
    pub async fn refresh(&mut self) -> CoreResult<()> {
        self.categories = self.service.list_all(self.owner_id).await?;
        Ok(())
    }

    async fn transition(
        &mut self,
        id: Uuid,
        operation: &'static str,
        apply: fn(&mut Category) -> Result<(), CategoryTransitionError>,
    ) -> CoreResult<()> {
        let index = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::CategoryNotFound(id))?;
        let mut updated = self.categories[index].clone();
        apply(&mut updated).map_err(|err| CoreError::InvalidTransition(err.to_string()))?;

        let last_known_good = self.categories.clone();
        self.categories[index] = updated.clone();

        match self.service.store.update_category(&updated).await {
            Ok(()) => {
                tracing::debug!(category_id = %id, state = %updated.state, "category state committed");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(category_id = %id, error = %source, "category update failed; re-fetching");
                if let Err(refetch) = self.refresh().await {
                    tracing::warn!(error = %refetch, "re-fetch failed; restoring last known state");
                    self.categories = last_known_good;
                }
                Err(CoreError::WriteFailed { operation, source })
            }
        }
    }
}
