//! Data models

pub mod features;
pub mod table;
pub mod prediction;

pub use features::*;
pub use table::*;
pub use prediction::*;
