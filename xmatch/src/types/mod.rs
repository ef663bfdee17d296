//! Common types used throughout the cross-matching pipeline.
//!
//! Positions and projections feed the spatial matchers; cells, records and column tables are
//! the data exchanged with catalog and record providers.

mod cell;
mod column;
mod position;
mod projection;
mod record;

pub use cell::*;
pub use column::*;
pub use position::*;
pub use projection::*;
pub use record::*;
