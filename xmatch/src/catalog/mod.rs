//! Catalog sources and the projection of catalogs to their positional columns.

mod base;
pub mod json;
pub mod memory;
mod projector;

pub use base::*;
pub use json::JsonCatalog;
pub use memory::MemoryCatalog;
pub use projector::*;
