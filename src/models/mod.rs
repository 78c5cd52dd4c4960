pub mod analysis;
pub mod document;

pub use analysis::*;
pub use document::*;
