//! Business Services
//!
//! This module contains the public contract of the category hierarchy:
//!
//! - `CategoryRepository` - lookup, save/remove and hierarchy queries
//!
//! Services sit between application code and the `CategoryStore` backends,
//! validating values and handling the UNDEFINED sentinel before delegating.

pub mod category_service;
pub mod error;

pub use category_service::CategoryRepository;
pub use error::CategoryServiceError;
