//! Merging of the full records of cross-matched pairs.

mod fields;
mod provider;
mod stream;

pub use fields::*;
pub use provider::*;
pub use stream::*;
