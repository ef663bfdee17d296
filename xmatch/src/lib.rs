//! Positional cross-matching of astronomical catalogs.
//!
//! Catalogs are reduced to [`types::CatalogProjection`]s by the [`catalog`] projector, matched
//! pairwise or folded into a master catalog by [`crossmatch`], and the full records of matched
//! pairs are combined lazily by [`merge::merge_records`].

pub mod catalog;
pub mod crossmatch;
pub mod error;
mod macros;
pub mod merge;
pub mod metrics;
pub mod spatial;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
