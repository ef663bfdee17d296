mod base;
mod catalog;
mod matching;
mod projection;
mod runner;

pub use base::*;
pub use catalog::*;
pub use matching::*;
pub use projection::*;
pub use runner::*;
