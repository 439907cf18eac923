//! Shared types for the fantasy-players workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
