mod filter;
mod format;
mod manifest;
mod paged;
mod types;

pub use filter::*;
pub use format::*;
pub use manifest::*;
pub use paged::*;
pub use types::*;
