//! Utility module

mod error;
mod position;

pub use error::{Error, Result};
pub use position::Position;
