//! TursoStore - CategoryStore Implementation for the libsql Backend
//!
//! This module implements the `CategoryStore` trait on top of
//! [`DatabaseService`]. It is the relational home of the category forest:
//! every mutation reads the rows it needs, asks the Tree Mutator for a plan and
//! executes that plan as one transaction.
//!
//! # Design Principles
//!
//! 1. **Scoped connections**: each call opens its own connection and drops it
//!    before returning; a dropped connection rolls back anything uncommitted
//! 2. **Two layers of exclusion**: the per-root [`RootLocks`] serialize writers
//!    inside this process, `BEGIN IMMEDIATE` serializes writers across
//!    processes sharing the database file
//! 3. **Plans in, SQL out**: no interval arithmetic lives here, only the
//!    transliteration of each [`TreeStep`] into one statement
//! 4. **Single-statement reads**: every hierarchy query joins the target row in
//!    the same statement, so it sees exactly one committed state
//!
//! # Examples
//!
//! ```rust,no_run
//! use catalog_core::db::{CategoryStore, DatabaseService, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/catalog.db")).await?);
//!     let store: Arc<dyn CategoryStore> = Arc::new(TursoStore::new(db));
//!     let roots = store.roots().await?;
//!     println!("{} trees", roots.len());
//!     Ok(())
//! }
//! ```

use crate::db::category_store::{CategoryStore, DeleteResult};
use crate::db::error::{DatabaseError, StoreResult};
use crate::db::root_locks::{RootGuard, RootLocks};
use crate::db::DatabaseService;
use crate::models::{Category, CategoryId, CategoryName, Interval, PlacedCategory};
use crate::operations::{SaveKind, TreeMutator, TreePlan, TreeStep};
use async_trait::async_trait;
use libsql::{Connection, Row, Rows};
use std::future::Future;
use std::sync::Arc;

const CATEGORY_COLUMNS: &str =
    r#"id, parent_id, name, description, icon, root_id, "left", "right""#;

const JOINED_COLUMNS: &str =
    r#"c.id, c.parent_id, c.name, c.description, c.icon, c.root_id, c."left", c."right""#;

/// TursoStore implements CategoryStore for the libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
    locks: RootLocks,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self {
            db,
            locks: RootLocks::new(),
        }
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Convert a libsql row into a placed category
    ///
    /// # Row Format
    ///
    /// Expected columns (in order): id, parent_id, name (JSON), description,
    /// icon, root_id, left, right
    fn row_to_placed(row: &Row) -> Result<PlacedCategory, DatabaseError> {
        let corrupt = |field: &str, e: libsql::Error| {
            DatabaseError::corrupt_row(format!("Failed to get {}: {}", field, e))
        };

        let id: i64 = row.get(0).map_err(|e| corrupt("id", e))?;
        let parent_id: i64 = row.get(1).map_err(|e| corrupt("parent_id", e))?;
        let name_json: String = row.get(2).map_err(|e| corrupt("name", e))?;
        let description: Option<String> = row.get(3).map_err(|e| corrupt("description", e))?;
        let icon: Option<String> = row.get(4).map_err(|e| corrupt("icon", e))?;
        let root_id: i64 = row.get(5).map_err(|e| corrupt("root_id", e))?;
        let left: i64 = row.get(6).map_err(|e| corrupt("left", e))?;
        let right: i64 = row.get(7).map_err(|e| corrupt("right", e))?;

        let name: CategoryName = serde_json::from_str(&name_json).map_err(|e| {
            DatabaseError::corrupt_row(format!("Failed to parse name of category {}: {}", id, e))
        })?;

        Ok(PlacedCategory::new(
            Category::from_parts(id, parent_id, name, description, icon),
            Interval::new(left, right, root_id),
        ))
    }

    async fn collect(mut rows: Rows) -> Result<Vec<PlacedCategory>, DatabaseError> {
        let mut placed = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to read row: {}", e)))?
        {
            placed.push(Self::row_to_placed(&row)?);
        }
        Ok(placed)
    }

    async fn query_placed(
        conn: &Connection,
        sql: &str,
        id: CategoryId,
    ) -> Result<Vec<PlacedCategory>, DatabaseError> {
        let rows = conn
            .query(sql, [id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to execute query: {}", e)))?;
        Self::collect(rows).await
    }

    async fn fetch_placed(
        conn: &Connection,
        id: CategoryId,
    ) -> Result<Option<PlacedCategory>, DatabaseError> {
        let sql = format!("SELECT {} FROM category WHERE id = ?1", CATEGORY_COLUMNS);
        Ok(Self::query_placed(conn, &sql, id).await?.into_iter().next())
    }

    /// Run `work` between `BEGIN IMMEDIATE` and `COMMIT`, rolling back on error
    async fn in_transaction<T, F>(conn: &Connection, work: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::transaction_failed(format!("Failed to begin transaction: {}", e))
        })?;

        match work.await {
            Ok(value) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    if let Err(rollback) = conn.execute("ROLLBACK", ()).await {
                        tracing::warn!("Failed to roll back after failed commit: {}", rollback);
                    }
                    return Err(DatabaseError::transaction_failed(format!(
                        "Failed to commit transaction: {}",
                        e
                    ))
                    .into());
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = conn.execute("ROLLBACK", ()).await {
                    tracing::warn!("Failed to roll back after '{}': {}", err, e);
                } else {
                    tracing::debug!("Rolled back transaction: {}", err);
                }
                Err(err)
            }
        }
    }

    /// Execute one plan step, returning the number of rows it changed
    async fn execute_step(conn: &Connection, step: &TreeStep) -> Result<u64, DatabaseError> {
        let result = match step {
            TreeStep::Shift {
                root_id,
                bound,
                threshold,
                delta,
            } => {
                let column = bound.column();
                let (operator, value) = threshold.sql();
                let sql = format!(
                    "UPDATE category SET {column} = {column} + ?1 WHERE root_id = ?2 AND {column} {operator} ?3"
                );
                conn.execute(&sql, (*delta, *root_id, value)).await
            }
            TreeStep::Insert { category, interval } => {
                let name_json = serde_json::to_string(&category.name).map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to serialize name: {}", e))
                })?;
                conn.execute(
                    &format!(
                        "INSERT INTO category ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        CATEGORY_COLUMNS
                    ),
                    (
                        category.id,
                        category.parent_id,
                        name_json.as_str(),
                        category.description.as_deref(),
                        category.icon.as_deref(),
                        interval.root_id,
                        interval.left,
                        interval.right,
                    ),
                )
                .await
            }
            TreeStep::UpdateFields { category } => {
                let name_json = serde_json::to_string(&category.name).map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to serialize name: {}", e))
                })?;
                conn.execute(
                    "UPDATE category SET name = ?1, description = ?2, icon = ?3 WHERE id = ?4",
                    (
                        name_json.as_str(),
                        category.description.as_deref(),
                        category.icon.as_deref(),
                        category.id,
                    ),
                )
                .await
            }
            TreeStep::Detach {
                root_id,
                left,
                right,
                into_root,
            } => {
                conn.execute(
                    r#"UPDATE category SET "left" = -"left", "right" = -"right", root_id = ?1
                       WHERE root_id = ?2 AND "left" >= ?3 AND "right" <= ?4"#,
                    (*into_root, *root_id, *left, *right),
                )
                .await
            }
            TreeStep::Reattach { root_id, offset } => {
                conn.execute(
                    r#"UPDATE category SET "left" = ?1 - "left", "right" = ?1 - "right"
                       WHERE root_id = ?2 AND "left" < 0"#,
                    (*offset, *root_id),
                )
                .await
            }
            TreeStep::Reparent { id, parent_id } => {
                conn.execute(
                    "UPDATE category SET parent_id = ?1 WHERE id = ?2",
                    (*parent_id, *id),
                )
                .await
            }
            TreeStep::DeleteRange {
                root_id,
                left,
                right,
            } => {
                conn.execute(
                    r#"DELETE FROM category WHERE root_id = ?1 AND "left" >= ?2 AND "right" <= ?3"#,
                    (*root_id, *left, *right),
                )
                .await
            }
        };

        result.map_err(|e| DatabaseError::sql_execution(format!("Failed to apply {:?}: {}", step, e)))
    }

    async fn execute_plan(conn: &Connection, plan: &TreePlan) -> Result<Vec<u64>, DatabaseError> {
        let mut affected = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            affected.push(Self::execute_step(conn, step).await?);
        }
        Ok(affected)
    }

    /// Trees a save is expected to touch, from an unlocked read
    async fn expected_save_roots(
        conn: &Connection,
        category: &Category,
    ) -> Result<Vec<CategoryId>, DatabaseError> {
        let mut roots = Vec::new();
        match Self::fetch_placed(conn, category.id).await? {
            Some(existing) => roots.push(existing.interval.root_id),
            None if category.is_root() => roots.push(category.id),
            None => {}
        }
        if !category.is_root() {
            if let Some(parent) = Self::fetch_placed(conn, category.parent_id).await? {
                roots.push(parent.interval.root_id);
            }
        }
        Ok(roots)
    }

    /// Plan and execute a save inside the open transaction
    ///
    /// Returns `None` when the plan needs a tree the guard does not hold; the
    /// caller then retries with fresh locks.
    async fn save_locked(
        conn: &Connection,
        category: &Category,
        guard: &RootGuard,
    ) -> StoreResult<Option<(SaveKind, TreePlan)>> {
        let existing = Self::fetch_placed(conn, category.id).await?;
        let parent = if category.is_root() {
            None
        } else {
            Self::fetch_placed(conn, category.parent_id).await?
        };

        let (kind, plan) = TreeMutator::plan_save(category, existing.as_ref(), parent.as_ref())?;
        if !guard.covers(&plan.roots) {
            return Ok(None);
        }

        Self::execute_plan(conn, &plan).await?;
        conn.execute(
            "UPDATE category_sequence SET value = MAX(value, ?1) WHERE name = 'category'",
            [category.id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to advance sequence: {}", e)))?;

        Ok(Some((kind, plan)))
    }

    async fn remove_locked(
        conn: &Connection,
        id: CategoryId,
        guard: &RootGuard,
    ) -> StoreResult<Option<(DeleteResult, Option<CategoryId>)>> {
        let Some(node) = Self::fetch_placed(conn, id).await? else {
            return Ok(Some((DeleteResult::missing(), None)));
        };

        let plan = TreeMutator::plan_delete(&node)?;
        if !guard.covers(&plan.roots) {
            return Ok(None);
        }

        let affected = Self::execute_plan(conn, &plan).await?;
        let removed = affected.first().copied().unwrap_or_default();
        let emptied_root = node.category.is_root().then_some(node.interval.root_id);
        Ok(Some((
            DeleteResult {
                existed: true,
                removed,
            },
            emptied_root,
        )))
    }

    async fn next_identity_in_transaction(conn: &Connection) -> StoreResult<CategoryId> {
        conn.execute(
            "UPDATE category_sequence SET value = value + 1 WHERE name = 'category'",
            (),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to advance sequence: {}", e)))?;

        let mut rows = conn
            .query(
                "SELECT value FROM category_sequence WHERE name = 'category'",
                (),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to read sequence: {}", e)))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .ok_or_else(|| DatabaseError::sql_execution("Category sequence is missing"))?;
        let value: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::corrupt_row(format!("Failed to get sequence value: {}", e)))?;
        Ok(value)
    }
}

#[async_trait]
impl CategoryStore for TursoStore {
    async fn find(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(Self::fetch_placed(&conn, id)
            .await?
            .map(|placed| placed.category))
    }

    async fn placement(&self, id: CategoryId) -> StoreResult<Option<Interval>> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(Self::fetch_placed(&conn, id)
            .await?
            .map(|placed| placed.interval))
    }

    async fn save(&self, category: Category) -> StoreResult<SaveKind> {
        let conn = self.db.connect_with_timeout().await?;

        loop {
            let roots = Self::expected_save_roots(&conn, &category).await?;
            let guard = self.locks.lock(roots).await;

            let outcome =
                Self::in_transaction(&conn, Self::save_locked(&conn, &category, &guard)).await?;
            match outcome {
                Some((kind, plan)) => {
                    if kind == SaveKind::CreatedRoot {
                        tracing::info!(id = category.id, "Created category tree");
                    }
                    // A moved category whose id names a tree was that tree's root
                    if kind == SaveKind::Moved && plan.roots.contains(&category.id) {
                        drop(guard);
                        self.locks.forget(category.id);
                        tracing::info!(id = category.id, "Merged category tree into another");
                    }
                    tracing::debug!(
                        id = category.id,
                        ?kind,
                        roots = ?plan.roots,
                        steps = plan.steps.len(),
                        "Committed category save"
                    );
                    return Ok(kind);
                }
                None => {
                    tracing::debug!(
                        id = category.id,
                        held = ?guard.roots(),
                        "Tree changed before lock acquisition, retrying save"
                    );
                }
            }
        }
    }

    async fn remove(&self, id: CategoryId) -> StoreResult<DeleteResult> {
        let conn = self.db.connect_with_timeout().await?;

        loop {
            let Some(node) = Self::fetch_placed(&conn, id).await? else {
                return Ok(DeleteResult::missing());
            };
            let guard = self.locks.lock([node.interval.root_id]).await;

            let outcome = Self::in_transaction(&conn, Self::remove_locked(&conn, id, &guard)).await?;
            let Some((result, emptied_root)) = outcome else {
                tracing::debug!(id, "Tree changed before lock acquisition, retrying remove");
                continue;
            };

            drop(guard);
            if let Some(root_id) = emptied_root {
                self.locks.forget(root_id);
            }
            tracing::debug!(id, removed = result.removed, "Committed category removal");
            return Ok(result);
        }
    }

    async fn next_identity(&self) -> StoreResult<CategoryId> {
        let conn = self.db.connect_with_timeout().await?;
        Self::in_transaction(&conn, Self::next_identity_in_transaction(&conn)).await
    }

    async fn roots(&self) -> StoreResult<Vec<Category>> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {} FROM category WHERE id = parent_id ORDER BY id",
            CATEGORY_COLUMNS
        );
        let rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query roots: {}", e)))?;
        Ok(Self::collect(rows)
            .await?
            .into_iter()
            .map(|placed| placed.category)
            .collect())
    }

    async fn children(&self, id: CategoryId) -> StoreResult<Vec<Category>> {
        let conn = self.db.connect_with_timeout().await?;
        // Immediate children: inside the target and not inside any other row that is
        let sql = format!(
            r#"SELECT {JOINED_COLUMNS}
               FROM category AS t
               JOIN category AS c
                 ON c.root_id = t.root_id AND c."left" > t."left" AND c."right" < t."right"
               WHERE t.id = ?1
                 AND NOT EXISTS (
                   SELECT 1 FROM category AS m
                   WHERE m.root_id = t.root_id
                     AND m."left" > t."left" AND m."right" < t."right"
                     AND m."left" < c."left" AND c."right" < m."right"
                 )
               ORDER BY c."left""#
        );
        Ok(Self::query_placed(&conn, &sql, id)
            .await?
            .into_iter()
            .map(|placed| placed.category)
            .collect())
    }

    async fn descendants(&self, id: CategoryId) -> StoreResult<Vec<Category>> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            r#"SELECT {JOINED_COLUMNS}
               FROM category AS t
               JOIN category AS c
                 ON c.root_id = t.root_id AND c."left" > t."left" AND c."right" < t."right"
               WHERE t.id = ?1
               ORDER BY c."left""#
        );
        Ok(Self::query_placed(&conn, &sql, id)
            .await?
            .into_iter()
            .map(|placed| placed.category)
            .collect())
    }

    async fn path(&self, id: CategoryId) -> StoreResult<Option<Vec<Category>>> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            r#"SELECT {JOINED_COLUMNS}
               FROM category AS t
               JOIN category AS c
                 ON c.root_id = t.root_id AND c."left" <= t."left" AND c."right" >= t."right"
               WHERE t.id = ?1
               ORDER BY c."left""#
        );
        let chain: Vec<Category> = Self::query_placed(&conn, &sql, id)
            .await?
            .into_iter()
            .map(|placed| placed.category)
            .collect();
        // The target always encloses itself, so an empty chain means it does not exist
        Ok((!chain.is_empty()).then_some(chain))
    }

    async fn depth(&self, id: CategoryId) -> StoreResult<Option<usize>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                r#"SELECT COUNT(c.id)
                   FROM category AS t
                   JOIN category AS c
                     ON c.root_id = t.root_id AND c."left" <= t."left" AND c."right" >= t."right"
                   WHERE t.id = ?1"#,
                [id],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query depth: {}", e)))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .ok_or_else(|| DatabaseError::sql_execution("COUNT returned no row"))?;
        let enclosing: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::corrupt_row(format!("Failed to get depth: {}", e)))?;
        Ok((enclosing > 0).then(|| (enclosing - 1) as usize))
    }

    async fn snapshot(&self, root_id: CategoryId) -> StoreResult<Vec<PlacedCategory>> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            r#"SELECT {} FROM category WHERE root_id = ?1 ORDER BY "left""#,
            CATEGORY_COLUMNS
        );
        Ok(Self::query_placed(&conn, &sql, root_id).await?)
    }
}
