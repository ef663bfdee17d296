//! Pairwise cross-matching and master catalog construction.

mod master;
mod pairwise;
mod table;

pub use master::*;
pub use pairwise::{cross_match, cross_match_catalogs};
pub use table::*;
