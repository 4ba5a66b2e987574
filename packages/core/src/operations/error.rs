//! Error types for the Tree Mutator
//!
//! These errors represent structural rule violations detected while planning a
//! mutation. They are raised before any row is touched, so a failed plan never
//! leaves partial writes behind.

use crate::models::{CategoryId, ValidationError};
use thiserror::Error;

/// Errors that can occur while planning a tree mutation
///
/// # Examples
///
/// ```rust
/// use catalog_core::operations::TreeOperationError;
///
/// let err = TreeOperationError::CircularReference { id: 2, parent_id: 5 };
/// assert!(err.is_invalid_parent());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeOperationError {
    /// Referenced parent does not exist (or is the sentinel, which owns no interval)
    #[error("Parent {parent_id} of category {id} does not exist")]
    ParentNotFound { id: CategoryId, parent_id: CategoryId },

    /// An existing category cannot become its own parent
    #[error("Category {id} cannot be moved under itself")]
    SelfParent { id: CategoryId },

    /// Target parent lies inside the subtree being moved
    #[error("Moving category {id} under {parent_id} would create a cycle")]
    CircularReference { id: CategoryId, parent_id: CategoryId },

    /// The UNDEFINED sentinel cannot be saved, moved or removed
    #[error("The undefined category cannot be modified")]
    SentinelImmutable,

    /// Category value failed validation
    #[error("Category validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl TreeOperationError {
    /// True for every rejection reported to callers as InvalidParent
    pub fn is_invalid_parent(&self) -> bool {
        matches!(
            self,
            Self::ParentNotFound { .. } | Self::SelfParent { .. } | Self::CircularReference { .. }
        )
    }
}
