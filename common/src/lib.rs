pub mod file_utils;
pub mod types;

pub use file_utils::*;
pub use types::*;
