//! Data Models
//!
//! This module contains the core data structures of the category hierarchy:
//!
//! - `Category` - Application-facing category record (self-parented roots)
//! - `Interval` - Nested-set position of a category within its tree
//! - `verify_tree` - Invariant audit over the rows of one tree
//!
//! Interval bounds are store-owned; application code only ever handles
//! `Category` values.

mod category;
mod interval;

pub use category::{Category, CategoryId, CategoryName, ValidationError, UNDEFINED_ID};
pub use interval::{verify_tree, Interval, InvariantViolation, PlacedCategory};
