//! Catalog Core - Category Hierarchy Storage
//!
//! This crate stores a forest of category trees using the nested-set model and
//! exposes them through a repository facade.
//!
//! # Architecture
//!
//! - **Nested sets**: every category carries `(left, right, root_id)`; all
//!   hierarchy reads are single range comparisons, never recursion
//! - **Planned mutations**: insert, move and delete are computed as a
//!   `TreePlan` and executed atomically by a store
//! - **libsql**: embedded SQLite-compatible database as the durable backend
//! - **Per-tree exclusion**: concurrent writers on one tree are serialized by
//!   the store, callers never lock
//!
//! # Modules
//!
//! - [`models`] - Category values and the interval codec
//! - [`operations`] - Tree Mutator planning insert, move and delete
//! - [`db`] - Database layer: `CategoryStore` trait and its backends
//! - [`services`] - `CategoryRepository` facade
//! - [`config`] - Store configuration from defaults or environment

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::{StoreBackend, StoreConfig};
pub use models::*;
pub use services::*;
