//! Testing utilities for cross-matching pipelines.
//!
//! - [`sky`] generates reproducible synthetic objects, optionally jittered so that the same
//!   objects can be observed by several catalogs.
//! - [`catalog`] turns synthetic objects into [`crate::catalog::MemoryCatalog`] instances.
//! - [`provider`] wraps record providers to reorder, decorate or fail their partitions.

pub mod catalog;
pub mod provider;
pub mod sky;
