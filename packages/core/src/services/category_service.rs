//! Category Repository - public contract of the category hierarchy
//!
//! This module provides the facade application code uses to read and change
//! the category forest:
//!
//! - Lookup (`find`, `root`, `next_identity`)
//! - Mutation (`save` dispatches to insert, field update or move; `remove`
//!   cascades to the subtree)
//! - Hierarchy queries (`children`, `descendants`, `path`, `depth`)
//! - Diagnostics (`placement`, `verify`)
//!
//! # The UNDEFINED Sentinel
//!
//! `Category::undefined()` is a catch-all default that lives only here. It is
//! never persisted and owns no interval: `find(UNDEFINED_ID)` returns it,
//! `root()` lists it after the real roots, and any attempt to save or remove
//! it fails with [`CategoryServiceError::SentinelImmutable`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use catalog_core::config::StoreConfig;
//! use catalog_core::models::{Category, CategoryName};
//! use catalog_core::services::CategoryRepository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let repository = CategoryRepository::from_config(&StoreConfig::memory()).await?;
//!
//!     let food = repository.next_identity().await?;
//!     repository
//!         .save(Category::new_root(food, CategoryName::new("Food", "shipin", "food")))
//!         .await?;
//!
//!     let fruit = repository.next_identity().await?;
//!     repository
//!         .save(Category::new(fruit, food, CategoryName::new("Fruit", "shuiguo", "fruit")))
//!         .await?;
//!
//!     assert_eq!(repository.depth(fruit).await?, Some(1));
//!     Ok(())
//! }
//! ```

use crate::config::{StoreBackend, StoreConfig};
use crate::db::{CategoryStore, DatabaseService, DeleteResult, MemoryStore, TursoStore};
use crate::models::{verify_tree, Category, CategoryId, Interval, UNDEFINED_ID};
use crate::services::error::CategoryServiceError;
use std::sync::Arc;

type ServiceResult<T> = Result<T, CategoryServiceError>;

/// Facade over a [`CategoryStore`]
///
/// Cheap to clone; every clone shares the same store.
#[derive(Clone)]
pub struct CategoryRepository {
    store: Arc<dyn CategoryStore>,
}

impl CategoryRepository {
    pub fn new(store: Arc<dyn CategoryStore>) -> Self {
        Self { store }
    }

    /// Open the backend selected by `config`
    ///
    /// # Errors
    ///
    /// - `Configuration` if the settings fail validation
    /// - `PersistenceFailure` if the libsql database cannot be opened
    pub async fn from_config(config: &StoreConfig) -> ServiceResult<Self> {
        config.validate()?;

        let store: Arc<dyn CategoryStore> = match config.backend {
            StoreBackend::Turso => {
                let db = DatabaseService::with_busy_timeout(
                    config.database_path.clone(),
                    config.busy_timeout_ms,
                )
                .await?;
                Arc::new(TursoStore::new(Arc::new(db)))
            }
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };

        tracing::info!("Opened category repository ({} backend)", config.backend);
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &Arc<dyn CategoryStore> {
        &self.store
    }

    /// Get a category by id; `None` is a normal miss
    pub async fn find(&self, id: CategoryId) -> ServiceResult<Option<Category>> {
        if id == UNDEFINED_ID {
            return Ok(Some(Category::undefined()));
        }
        Ok(self.store.find(id).await?)
    }

    /// Get a category by id, treating a miss as an error
    pub async fn get(&self, id: CategoryId) -> ServiceResult<Category> {
        self.find(id)
            .await?
            .ok_or_else(|| CategoryServiceError::not_found(id))
    }

    /// Persist `category` and return its committed state
    ///
    /// - New id, `parent_id == id`: creates a new tree
    /// - New id, existing parent: appended as the parent's last child
    /// - Existing id, same parent: updates name, description and icon only
    /// - Existing id, different parent: moves the whole subtree
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank name or non-positive ids
    /// - `InvalidParent` for a missing or non-positive parent, or a move into the own subtree
    /// - `SentinelImmutable` for the undefined category
    /// - `PersistenceFailure` when the transaction fails; nothing is written
    pub async fn save(&self, category: Category) -> ServiceResult<Category> {
        if category.is_undefined() {
            return Err(CategoryServiceError::SentinelImmutable);
        }
        category.validate()?;

        let id = category.id;
        let kind = self.store.save(category).await?;
        tracing::debug!(id, ?kind, "Saved category");

        self.get(id).await
    }

    /// Remove a category and its whole subtree
    pub async fn remove(&self, id: CategoryId) -> ServiceResult<DeleteResult> {
        if id == UNDEFINED_ID {
            return Err(CategoryServiceError::SentinelImmutable);
        }
        let result = self.store.remove(id).await?;
        if result.existed {
            tracing::debug!(id, removed = result.removed, "Removed category subtree");
        }
        Ok(result)
    }

    /// One root per tree ordered by id, followed by the undefined category
    pub async fn root(&self) -> ServiceResult<Vec<Category>> {
        let mut roots = self.store.roots().await?;
        roots.push(Category::undefined());
        Ok(roots)
    }

    pub async fn children(&self, id: CategoryId) -> ServiceResult<Vec<Category>> {
        if id == UNDEFINED_ID {
            return Ok(Vec::new());
        }
        Ok(self.store.children(id).await?)
    }

    pub async fn descendants(&self, id: CategoryId) -> ServiceResult<Vec<Category>> {
        if id == UNDEFINED_ID {
            return Ok(Vec::new());
        }
        Ok(self.store.descendants(id).await?)
    }

    /// Root-to-node chain, the node included
    pub async fn path(&self, id: CategoryId) -> ServiceResult<Option<Vec<Category>>> {
        if id == UNDEFINED_ID {
            return Ok(Some(vec![Category::undefined()]));
        }
        Ok(self.store.path(id).await?)
    }

    pub async fn depth(&self, id: CategoryId) -> ServiceResult<Option<usize>> {
        if id == UNDEFINED_ID {
            return Ok(Some(0));
        }
        Ok(self.store.depth(id).await?)
    }

    pub async fn next_identity(&self) -> ServiceResult<CategoryId> {
        Ok(self.store.next_identity().await?)
    }

    /// Stored interval of a category, for diagnostics only
    pub async fn placement(&self, id: CategoryId) -> ServiceResult<Option<Interval>> {
        Ok(self.store.placement(id).await?)
    }

    /// Audit every nested-set invariant of one tree
    pub async fn verify(&self, root_id: CategoryId) -> ServiceResult<()> {
        let rows = self.store.snapshot(root_id).await?;
        verify_tree(root_id, &rows).map_err(|violation| {
            tracing::warn!(root_id, %violation, "Category tree failed verification");
            CategoryServiceError::InvariantViolation { root_id, violation }
        })
    }
}

#[cfg(test)]
#[path = "category_service_tree_test.rs"]
mod category_service_tree_test;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryName;

    fn repository() -> CategoryRepository {
        CategoryRepository::new(Arc::new(MemoryStore::new()))
    }

    fn name(n: &str) -> CategoryName {
        CategoryName::new(n, n.to_lowercase(), n)
    }

    #[tokio::test]
    async fn test_save_returns_committed_state() {
        let repository = repository();
        let saved = repository
            .save(Category::new_root(1, name("Food")).with_icon("icons/food.svg"))
            .await
            .unwrap();
        assert_eq!(saved.id, 1);
        assert_eq!(saved.icon.as_deref(), Some("icons/food.svg"));
    }

    #[tokio::test]
    async fn test_blank_name_rejected_before_store() {
        let repository = repository();
        let err = repository
            .save(Category::new_root(1, CategoryName::new("  ", "", "")))
            .await
            .unwrap_err();
        assert!(matches!(err, CategoryServiceError::Validation(_)));
        assert!(repository.find(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_reports_not_found() {
        let err = repository().get(99).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::NotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_settings() {
        let err = CategoryRepository::from_config(&StoreConfig::turso(""))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CategoryServiceError::Configuration(_)));
    }
}
