//! Database Layer
//!
//! This module handles persistence of the category forest:
//!
//! - Database initialization and connection management (libsql)
//! - The `CategoryStore` contract shared by every backend
//! - Per-tree write exclusion for structural mutations
//!
//! # Architecture
//!
//! Two backends implement [`CategoryStore`]:
//!
//! - [`TursoStore`] - embedded libsql file, durable, safe across processes
//! - [`MemoryStore`] - in-process vector, used by tests and throwaway tools
//!
//! Both execute the same `TreePlan`s produced by
//! [`TreeMutator`](crate::operations::TreeMutator); only the execution differs.

mod category_store;
mod database;
mod error;
mod memory_store;
mod root_locks;
mod turso_store;

pub use category_store::{CategoryStore, DeleteResult};
pub use database::{DatabaseService, DEFAULT_BUSY_TIMEOUT_MS};
pub use error::{DatabaseError, StoreError, StoreResult};
pub use memory_store::MemoryStore;
pub use root_locks::{RootGuard, RootLocks};
pub use turso_store::TursoStore;
