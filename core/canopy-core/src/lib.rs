pub mod atomic;
pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use error::{CanopyError, Result};
pub use types::*;
