//! MemoryStore - in-process CategoryStore backend
//!
//! Keeps every row in a vector guarded by one `tokio::sync::RwLock`. Mutations
//! run the same `TreePlan`s as the relational backend; holding the write guard
//! for the whole plan is this backend's exclusion and atomicity.
//!
//! Suited to tests and to short-lived tools that do not need durability.

use crate::db::category_store::{CategoryStore, DeleteResult};
use crate::db::error::StoreResult;
use crate::models::{Category, CategoryId, Interval, PlacedCategory};
use crate::operations::{SaveKind, TreeMutator, TreeStep};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<PlacedCategory>>,
    sequence: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_row(rows: &[PlacedCategory], id: CategoryId) -> Option<&PlacedCategory> {
    rows.iter().find(|row| row.id() == id)
}

fn in_left_order<'a>(rows: impl Iterator<Item = &'a PlacedCategory>) -> Vec<&'a PlacedCategory> {
    let mut rows: Vec<&PlacedCategory> = rows.collect();
    rows.sort_by_key(|row| row.interval.left);
    rows
}

fn categories<'a>(rows: impl IntoIterator<Item = &'a PlacedCategory>) -> Vec<Category> {
    rows.into_iter().map(|row| row.category.clone()).collect()
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn find(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let rows = self.rows.read().await;
        Ok(find_row(&rows, id).map(|row| row.category.clone()))
    }

    async fn placement(&self, id: CategoryId) -> StoreResult<Option<Interval>> {
        let rows = self.rows.read().await;
        Ok(find_row(&rows, id).map(|row| row.interval))
    }

    async fn save(&self, category: Category) -> StoreResult<SaveKind> {
        let mut rows = self.rows.write().await;

        let existing = find_row(&rows, category.id).cloned();
        let parent = if category.is_root() {
            None
        } else {
            find_row(&rows, category.parent_id).cloned()
        };
        let (kind, plan) = TreeMutator::plan_save(&category, existing.as_ref(), parent.as_ref())?;

        for step in &plan.steps {
            step.apply_to(&mut rows);
        }
        self.sequence.fetch_max(category.id, Ordering::SeqCst);

        tracing::debug!(id = category.id, ?kind, roots = ?plan.roots, "Saved category in memory");
        Ok(kind)
    }

    async fn remove(&self, id: CategoryId) -> StoreResult<DeleteResult> {
        let mut rows = self.rows.write().await;
        let Some(node) = find_row(&rows, id).cloned() else {
            return Ok(DeleteResult::missing());
        };

        let plan = TreeMutator::plan_delete(&node)?;
        let mut removed = 0;
        for step in &plan.steps {
            let affected = step.apply_to(&mut rows);
            if matches!(step, TreeStep::DeleteRange { .. }) {
                removed = affected;
            }
        }

        tracing::debug!(id, removed, root_id = node.interval.root_id, "Removed category subtree in memory");
        Ok(DeleteResult {
            existed: true,
            removed,
        })
    }

    async fn next_identity(&self) -> StoreResult<CategoryId> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn roots(&self) -> StoreResult<Vec<Category>> {
        let rows = self.rows.read().await;
        let mut roots = categories(rows.iter().filter(|row| row.category.is_root()));
        roots.sort_by_key(|category| category.id);
        Ok(roots)
    }

    async fn children(&self, id: CategoryId) -> StoreResult<Vec<Category>> {
        let rows = self.rows.read().await;
        let Some(target) = find_row(&rows, id) else {
            return Ok(Vec::new());
        };

        // In left order, an immediate child starts after the previous child ends
        let mut children = Vec::new();
        let mut last_right = target.interval.left;
        for row in in_left_order(rows.iter().filter(|row| target.interval.is_ancestor_of(&row.interval))) {
            if row.interval.left > last_right {
                last_right = row.interval.right;
                children.push(row.category.clone());
            }
        }
        Ok(children)
    }

    async fn descendants(&self, id: CategoryId) -> StoreResult<Vec<Category>> {
        let rows = self.rows.read().await;
        let Some(target) = find_row(&rows, id) else {
            return Ok(Vec::new());
        };
        Ok(categories(in_left_order(
            rows.iter()
                .filter(|row| target.interval.is_ancestor_of(&row.interval)),
        )))
    }

    async fn path(&self, id: CategoryId) -> StoreResult<Option<Vec<Category>>> {
        let rows = self.rows.read().await;
        let Some(target) = find_row(&rows, id) else {
            return Ok(None);
        };
        Ok(Some(categories(in_left_order(
            rows.iter().filter(|row| row.interval.encloses(&target.interval)),
        ))))
    }

    async fn depth(&self, id: CategoryId) -> StoreResult<Option<usize>> {
        let rows = self.rows.read().await;
        let Some(target) = find_row(&rows, id) else {
            return Ok(None);
        };
        let ancestors = rows
            .iter()
            .filter(|row| row.interval.is_ancestor_of(&target.interval))
            .count();
        Ok(Some(ancestors))
    }

    async fn snapshot(&self, root_id: CategoryId) -> StoreResult<Vec<PlacedCategory>> {
        let rows = self.rows.read().await;
        Ok(in_left_order(rows.iter().filter(|row| row.interval.root_id == root_id))
            .into_iter()
            .cloned()
            .collect())
    }
}
