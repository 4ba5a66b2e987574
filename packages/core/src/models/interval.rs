//! Interval Codec
//!
//! Pure functions over the nested-set encoding of the category forest. Every
//! category occupies an interval `[left, right]` inside the numbering space of
//! its tree (`root_id`); containment of intervals is ancestry.
//!
//! No read query walks the tree recursively. Children, descendants, ancestor
//! paths and depth are all answered by the range predicates defined here (or
//! their SQL transliteration in the libsql backend).
//!
//! # Examples
//!
//! ```rust
//! use catalog_core::models::Interval;
//!
//! let root = Interval::new(1, 6, 10);
//! let child = Interval::new(2, 5, 10);
//! let leaf = Interval::new(3, 4, 10);
//!
//! assert!(root.is_ancestor_of(&leaf));
//! assert!(leaf.is_descendant_of(&child));
//! assert_eq!(root.descendant_count(), 2);
//! assert_eq!(child.width(), 4);
//! ```

use super::category::{Category, CategoryId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Position of one category inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub left: i64,
    pub right: i64,
    pub root_id: CategoryId,
}

impl Interval {
    pub fn new(left: i64, right: i64, root_id: CategoryId) -> Self {
        Self {
            left,
            right,
            root_id,
        }
    }

    /// Interval of a freshly created tree root
    pub fn root(root_id: CategoryId) -> Self {
        Self::new(1, 2, root_id)
    }

    /// Interval of a new leaf whose left bound is `left`
    pub fn leaf(left: i64, root_id: CategoryId) -> Self {
        Self::new(left, left + 1, root_id)
    }

    /// Number of interval units the whole subtree occupies
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Number of strict descendants, derived from the bounds alone
    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    pub fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }

    /// `self` strictly contains `other` within the same tree
    pub fn is_ancestor_of(&self, other: &Interval) -> bool {
        self.root_id == other.root_id && self.left < other.left && other.right < self.right
    }

    pub fn is_descendant_of(&self, other: &Interval) -> bool {
        other.is_ancestor_of(self)
    }

    /// Ancestor or the same node; the predicate behind path queries
    pub fn encloses(&self, other: &Interval) -> bool {
        self.root_id == other.root_id && self.left <= other.left && other.right <= self.right
    }
}

/// A category together with the interval the store keeps for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedCategory {
    pub category: Category,
    pub interval: Interval,
}

impl PlacedCategory {
    pub fn new(category: Category, interval: Interval) -> Self {
        Self { category, interval }
    }

    pub fn id(&self) -> CategoryId {
        self.category.id
    }
}

/// Ways a stored tree can fail the nested-set invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Tree {root_id} has no root row")]
    MissingRoot { root_id: CategoryId },

    #[error("Tree {root_id} has more than one root: {first} and {second}")]
    MultipleRoots {
        root_id: CategoryId,
        first: CategoryId,
        second: CategoryId,
    },

    #[error("Root {id} of tree {root_id} must own the tree identity and span [1, {expected_right}], found [{left}, {right}]")]
    RootBounds {
        root_id: CategoryId,
        id: CategoryId,
        left: i64,
        right: i64,
        expected_right: i64,
    },

    #[error("Category {id} belongs to tree {actual} but was audited as part of tree {expected}")]
    ForeignRow {
        id: CategoryId,
        expected: CategoryId,
        actual: CategoryId,
    },

    #[error("Category {id} has malformed bounds [{left}, {right}]")]
    InvalidBounds { id: CategoryId, left: i64, right: i64 },

    #[error("Boundary value {value} is used twice in tree {root_id}")]
    DuplicateBoundary { root_id: CategoryId, value: i64 },

    #[error("Tree {root_id} numbering is not contiguous: expected {expected}, found {found}")]
    NonContiguous {
        root_id: CategoryId,
        expected: i64,
        found: i64,
    },

    #[error("Category {id} overlaps {other} without being contained by it")]
    Overlap { id: CategoryId, other: CategoryId },

    #[error("Category {id} records parent {parent_id} but its interval sits directly inside {container:?}")]
    ParentMismatch {
        id: CategoryId,
        parent_id: CategoryId,
        container: Option<CategoryId>,
    },
}

/// Check every nested-set invariant for the rows of one tree
///
/// `rows` must be every row stored under `root_id`, in any order.
pub fn verify_tree(root_id: CategoryId, rows: &[PlacedCategory]) -> Result<(), InvariantViolation> {
    let mut root: Option<&PlacedCategory> = None;
    for row in rows {
        if row.interval.root_id != root_id {
            return Err(InvariantViolation::ForeignRow {
                id: row.id(),
                expected: root_id,
                actual: row.interval.root_id,
            });
        }
        let Interval { left, right, .. } = row.interval;
        if left < 1 || left >= right || (right - left) % 2 == 0 {
            return Err(InvariantViolation::InvalidBounds {
                id: row.id(),
                left,
                right,
            });
        }
        if row.category.is_root() {
            if let Some(first) = root {
                return Err(InvariantViolation::MultipleRoots {
                    root_id,
                    first: first.id(),
                    second: row.id(),
                });
            }
            root = Some(row);
        }
    }

    let root = root.ok_or(InvariantViolation::MissingRoot { root_id })?;
    let expected_right = 2 * rows.len() as i64;
    if root.id() != root_id || root.interval.left != 1 || root.interval.right != expected_right {
        return Err(InvariantViolation::RootBounds {
            root_id,
            id: root.id(),
            left: root.interval.left,
            right: root.interval.right,
            expected_right,
        });
    }

    let mut boundaries = BTreeSet::new();
    for row in rows {
        for value in [row.interval.left, row.interval.right] {
            if !boundaries.insert(value) {
                return Err(InvariantViolation::DuplicateBoundary { root_id, value });
            }
        }
    }
    for (expected, found) in (1..).zip(boundaries.iter().copied()) {
        if expected != found {
            return Err(InvariantViolation::NonContiguous {
                root_id,
                expected,
                found,
            });
        }
    }

    // Sweep in left order keeping the chain of open ancestors
    let mut ordered: Vec<&PlacedCategory> = rows.iter().collect();
    ordered.sort_by_key(|row| row.interval.left);
    let mut open: Vec<&PlacedCategory> = Vec::new();
    for row in ordered {
        while open
            .last()
            .is_some_and(|top| top.interval.right < row.interval.left)
        {
            open.pop();
        }
        match open.last() {
            Some(container) => {
                if row.interval.right > container.interval.right {
                    return Err(InvariantViolation::Overlap {
                        id: row.id(),
                        other: container.id(),
                    });
                }
                if row.category.parent_id != container.id() {
                    return Err(InvariantViolation::ParentMismatch {
                        id: row.id(),
                        parent_id: row.category.parent_id,
                        container: Some(container.id()),
                    });
                }
            }
            None if !row.category.is_root() => {
                return Err(InvariantViolation::ParentMismatch {
                    id: row.id(),
                    parent_id: row.category.parent_id,
                    container: None,
                });
            }
            None => {}
        }
        open.push(row);
    }

    Ok(())
}
