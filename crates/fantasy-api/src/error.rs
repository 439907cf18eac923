use std::path::PathBuf;

use thiserror::Error;

/// Fantasy sports API errors.
///
/// `Unauthorized` is split out from other statuses so callers can tell an
/// expired or revoked bearer token apart from a server-side failure.
#[derive(Error, Debug)]
pub enum Error {
    #[error("fantasy API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fantasy API rejected the access token; log in again")]
    Unauthorized,

    #[error("fantasy API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected fantasy API response: {0}")]
    Envelope(String),

    #[error("no available {0} game found; the season might be in the offseason")]
    NoActiveGame(String),

    #[error("failed to write snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
