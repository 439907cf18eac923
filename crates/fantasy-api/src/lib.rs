//! Fantasy sports API consumer
//!
//! Reads the current game and its player collection with a bearer
//! credential supplied by `yahoo-auth`, flattens the JSON envelope into
//! `PlayerRecord`s, and writes optional JSON snapshots.

pub mod client;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod export;

pub use client::{FantasyClient, PlayerPage};
pub use envelope::{Game, PlayerRecord};
pub use error::{Error, Result};
pub use export::Snapshot;
