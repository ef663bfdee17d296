//! Nearest-neighbor matching of sky positions.

mod kdtree;
mod matcher;

pub use kdtree::KdTree;
pub use matcher::*;
