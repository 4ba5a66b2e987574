//! CategoryStore Trait - Persistence Abstraction for the Category Forest
//!
//! This module defines the `CategoryStore` trait that abstracts persistence of
//! the nested-set category forest. Backends (libsql, in-memory) share one
//! contract; the repository facade only ever talks to the trait.
//!
//! # Contract
//!
//! - **Atomic mutations**: `save` and `remove` execute a whole `TreePlan` or
//!   nothing at all
//! - **Exclusion**: a backend serializes structural mutations per `root_id`;
//!   callers never lock
//! - **Interval reads**: `children`, `descendants`, `path`, `depth` are range
//!   predicates over one consistent snapshot, never recursive traversals
//! - **Misses are values**: unknown ids yield `None`, empty lists or
//!   `DeleteResult { existed: false, .. }` rather than errors
//!
//! # Examples
//!
//! ```rust,no_run
//! use catalog_core::db::{CategoryStore, MemoryStore};
//! use catalog_core::models::{Category, CategoryName};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn CategoryStore> = Arc::new(MemoryStore::new());
//!     let id = store.next_identity().await?;
//!     store
//!         .save(Category::new_root(id, CategoryName::new("Produce", "shucai", "veg")))
//!         .await?;
//!     assert_eq!(store.roots().await?.len(), 1);
//!     Ok(())
//! }
//! ```

use crate::db::error::StoreResult;
use crate::models::{Category, CategoryId, Interval, PlacedCategory};
use crate::operations::SaveKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Whether the category existed
    pub existed: bool,
    /// Number of rows deleted, the category itself included
    pub removed: u64,
}

impl DeleteResult {
    pub fn missing() -> Self {
        Self {
            existed: false,
            removed: 0,
        }
    }
}

/// Abstraction layer for category forest persistence
///
/// Implementations must be `Send + Sync` to be shared across request tasks.
/// None of the methods know about the `UNDEFINED` sentinel; the repository
/// facade handles it before delegating.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    //
    // LOOKUP
    //

    /// Get a category by id
    async fn find(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    /// Interval currently stored for a category (diagnostics only)
    async fn placement(&self, id: CategoryId) -> StoreResult<Option<Interval>>;

    //
    // MUTATION
    //

    /// Insert, update or move `category`, depending on what is stored
    ///
    /// # Errors
    ///
    /// - Tree error `ParentNotFound`, `SelfParent` or `CircularReference`
    ///   when the parent is missing or lies inside the moved subtree
    /// - Database error when the transaction fails; nothing is written
    async fn save(&self, category: Category) -> StoreResult<SaveKind>;

    /// Remove a category together with all of its descendants
    async fn remove(&self, id: CategoryId) -> StoreResult<DeleteResult>;

    /// Fresh identity that no stored or previously issued category uses
    async fn next_identity(&self) -> StoreResult<CategoryId>;

    //
    // HIERARCHY QUERIES
    //

    /// Roots of every tree, ordered by id
    async fn roots(&self) -> StoreResult<Vec<Category>>;

    /// Immediate children in left order; empty for unknown ids
    async fn children(&self, id: CategoryId) -> StoreResult<Vec<Category>>;

    /// All strict descendants in left order; empty for unknown ids
    async fn descendants(&self, id: CategoryId) -> StoreResult<Vec<Category>>;

    /// Root-to-node chain, node included; `None` for unknown ids
    async fn path(&self, id: CategoryId) -> StoreResult<Option<Vec<Category>>>;

    /// Number of ancestors; `None` for unknown ids
    async fn depth(&self, id: CategoryId) -> StoreResult<Option<usize>>;

    /// Every row of one tree with its interval, in left order
    async fn snapshot(&self, root_id: CategoryId) -> StoreResult<Vec<PlacedCategory>>;
}
