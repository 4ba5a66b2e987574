//! Tree Operations
//!
//! This module provides the nested-set Tree Mutator: pure planning of the row
//! updates behind insert, move and delete, plus the errors those plans can be
//! rejected with.
//!
//! Stores never do interval arithmetic themselves. They read the rows a
//! mutation needs, ask [`TreeMutator`] for a [`TreePlan`], and execute the
//! plan's steps atomically.

pub mod error;
pub mod tree_mutator;

pub use error::TreeOperationError;
pub use tree_mutator::{Bound, SaveKind, Threshold, TreeMutator, TreePlan, TreeStep};
