//! Service Layer Error Types
//!
//! This module defines the errors callers of the category repository see.
//! Lower layers report planning rejections (`TreeOperationError`) and
//! persistence failures (`DatabaseError`); both are folded into
//! [`CategoryServiceError`] here.

use crate::config::ConfigError;
use crate::db::{DatabaseError, StoreError};
use crate::models::{CategoryId, InvariantViolation, ValidationError};
use crate::operations::TreeOperationError;
use thiserror::Error;

/// Category repository errors
#[derive(Error, Debug)]
pub enum CategoryServiceError {
    /// Category value failed validation
    #[error("Category validation failed: {0}")]
    Validation(ValidationError),

    /// Parent missing, equal to the category itself, or inside its subtree
    #[error("Invalid parent {parent_id} for category {id}: {reason}")]
    InvalidParent {
        id: CategoryId,
        parent_id: CategoryId,
        reason: String,
    },

    /// Category not found by ID
    #[error("Category not found: {id}")]
    NotFound { id: CategoryId },

    /// The undefined category cannot be saved or removed
    #[error("The undefined category cannot be modified")]
    SentinelImmutable,

    /// Storage failed; the mutation was rolled back
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] DatabaseError),

    /// Store configuration is unusable
    #[error("Invalid store configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// A stored tree does not satisfy the nested-set invariants
    #[error("Tree {root_id} is inconsistent: {violation}")]
    InvariantViolation {
        root_id: CategoryId,
        violation: InvariantViolation,
    },
}

impl CategoryServiceError {
    /// Create a not found error
    pub fn not_found(id: CategoryId) -> Self {
        Self::NotFound { id }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(id: CategoryId, parent_id: CategoryId, reason: impl Into<String>) -> Self {
        Self::InvalidParent {
            id,
            parent_id,
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for CategoryServiceError {
    fn from(err: ValidationError) -> Self {
        match err {
            // A non-positive id can never name a stored parent
            ValidationError::InvalidParent { id, parent_id } => {
                Self::invalid_parent(id, parent_id, "parent does not exist")
            }
            other => Self::Validation(other),
        }
    }
}

impl From<TreeOperationError> for CategoryServiceError {
    fn from(err: TreeOperationError) -> Self {
        match err {
            TreeOperationError::ParentNotFound { id, parent_id } => {
                Self::invalid_parent(id, parent_id, "parent does not exist")
            }
            TreeOperationError::SelfParent { id } => {
                Self::invalid_parent(id, id, "a category cannot be its own parent")
            }
            TreeOperationError::CircularReference { id, parent_id } => {
                Self::invalid_parent(id, parent_id, "parent lies inside the moved subtree")
            }
            TreeOperationError::SentinelImmutable => Self::SentinelImmutable,
            TreeOperationError::Validation(err) => err.into(),
        }
    }
}

impl From<StoreError> for CategoryServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Tree(err) => err.into(),
            StoreError::Database(err) => Self::PersistenceFailure(err),
        }
    }
}
