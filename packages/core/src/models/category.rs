//! Category Data Structures
//!
//! This module defines the `Category` record consumed by the category
//! hierarchy store, together with its multi-part `CategoryName` and the
//! `UNDEFINED` sentinel.
//!
//! # Root Convention
//!
//! A category whose `parent_id` equals its own `id` is the root of an
//! independent tree. Interval bounds (`left`, `right`, `root_id`) are not part
//! of this record: they are owned by the store and never flow through
//! application logic.
//!
//! # Examples
//!
//! ```rust
//! use catalog_core::models::{Category, CategoryName};
//!
//! let beverages = Category::new_root(1, CategoryName::new("Beverages", "yinliao", "drinks"));
//! assert!(beverages.is_root());
//!
//! let tea = Category::new(2, 1, CategoryName::new("Tea", "cha", "tea"))
//!     .with_description("Loose leaf and bagged tea");
//! assert!(!tea.is_root());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category identity, globally unique across every tree
pub type CategoryId = i64;

/// Fixed identity of the catch-all `UNDEFINED` category
pub const UNDEFINED_ID: CategoryId = -1;

/// Validation errors for Category values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Category {id}: display name must not be blank")]
    BlankName { id: CategoryId },

    #[error("Invalid category id: {0}")]
    InvalidId(CategoryId),

    #[error("Invalid parent reference {parent_id} for category {id}")]
    InvalidParent { id: CategoryId, parent_id: CategoryId },
}

/// Display name of a category
///
/// Stored as a single JSON document in the `name` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryName {
    /// Display name shown to users
    pub name: String,

    /// Phonetic mnemonic used for quick lookup
    pub mnemonic: String,

    /// Alternative name
    pub alias: String,
}

impl CategoryName {
    pub fn new(
        name: impl Into<String>,
        mnemonic: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mnemonic: mnemonic.into(),
            alias: alias.into(),
        }
    }
}

/// A node of the category forest as seen by application code
///
/// # Fields
///
/// - `id`: Unique identifier (see [`CategoryId`])
/// - `parent_id`: Parent identity; equal to `id` for a root
/// - `name`: Display name, mnemonic and alias
/// - `description`: Optional free text
/// - `icon`: Optional icon URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub parent_id: CategoryId,
    pub name: CategoryName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Category {
    /// Create a category placed under `parent_id`
    pub fn new(id: CategoryId, parent_id: CategoryId, name: CategoryName) -> Self {
        Self {
            id,
            parent_id,
            name,
            description: None,
            icon: None,
        }
    }

    /// Create the root of a new independent tree
    pub fn new_root(id: CategoryId, name: CategoryName) -> Self {
        Self::new(id, id, name)
    }

    /// Rebuild a category from persisted column values
    pub fn from_parts(
        id: CategoryId,
        parent_id: CategoryId,
        name: CategoryName,
        description: Option<String>,
        icon: Option<String>,
    ) -> Self {
        Self {
            id,
            parent_id,
            name,
            description,
            icon,
        }
    }

    /// The catch-all sentinel category
    pub fn undefined() -> Self {
        Self::new_root(
            UNDEFINED_ID,
            CategoryName::new("undefined", "undefined", "undefined"),
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn rename(&mut self, name: CategoryName) {
        self.name = name;
    }

    /// Re-home this category under another parent; takes effect on the next save
    pub fn move_to(&mut self, parent_id: CategoryId) {
        self.parent_id = parent_id;
    }

    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }

    pub fn is_undefined(&self) -> bool {
        self.id == UNDEFINED_ID
    }

    /// Check the value before it reaches a store
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_undefined() {
            return Ok(());
        }
        if self.id <= 0 {
            return Err(ValidationError::InvalidId(self.id));
        }
        if self.parent_id <= 0 {
            return Err(ValidationError::InvalidParent {
                id: self.id,
                parent_id: self.parent_id,
            });
        }
        if self.name.name.trim().is_empty() {
            return Err(ValidationError::BlankName { id: self.id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> CategoryName {
        CategoryName::new(n, n.to_lowercase(), n)
    }

    #[test]
    fn test_root_convention() {
        let root = Category::new_root(7, name("Food"));
        assert!(root.is_root());
        assert_eq!(root.parent_id, 7);

        let child = Category::new(8, 7, name("Fruit"));
        assert!(!child.is_root());
    }

    #[test]
    fn test_undefined_sentinel() {
        let undefined = Category::undefined();
        assert!(undefined.is_undefined());
        assert!(undefined.is_root());
        assert!(undefined.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let category = Category::new(3, 1, name("   "));
        assert_eq!(
            category.validate(),
            Err(ValidationError::BlankName { id: 3 })
        );
    }

    #[test]
    fn test_validate_rejects_non_positive_ids() {
        assert_eq!(
            Category::new(0, 1, name("Zero")).validate(),
            Err(ValidationError::InvalidId(0))
        );
        assert_eq!(
            Category::new(4, -3, name("Orphan")).validate(),
            Err(ValidationError::InvalidParent {
                id: 4,
                parent_id: -3
            })
        );
    }

    #[test]
    fn test_name_serializes_as_json_document() {
        let json = serde_json::to_value(name("Tea")).unwrap();
        assert_eq!(json["name"], "Tea");
        assert_eq!(json["mnemonic"], "tea");
        assert_eq!(json["alias"], "Tea");
    }

    #[test]
    fn test_move_and_rename() {
        let mut category = Category::new(5, 1, name("Juice"))
            .with_icon("https://cdn.example.com/juice.png")
            .with_description("Fresh");
        category.move_to(2);
        category.rename(name("Juices"));
        assert_eq!(category.parent_id, 2);
        assert_eq!(category.name.name, "Juices");
        assert_eq!(category.icon.as_deref(), Some("https://cdn.example.com/juice.png"));
    }
}
