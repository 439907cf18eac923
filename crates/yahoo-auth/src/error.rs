//! Error types for the OAuth credential lifecycle

use std::fmt;
use std::time::Duration;

use crate::credentials::Credential;

/// Error code and description returned by the authorization server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRejection {
    pub code: String,
    pub description: Option<String>,
}

impl OAuthRejection {
    pub fn new(code: impl Into<String>, description: Option<String>) -> Self {
        Self {
            code: code.into(),
            description,
        }
    }
}

impl fmt::Display for OAuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({description})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Errors from token persistence, exchange, refresh, and authorization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token file exists but does not hold a readable credential.
    #[error("corrupt token state: {0}")]
    CorruptState(String),

    /// The token file could not be written. `unsaved` holds a freshly
    /// obtained credential that is valid for this process only.
    #[error("failed to persist credential: {reason}")]
    Persistence {
        reason: String,
        unsaved: Option<Box<Credential>>,
    },

    /// Network failure, 429 or 5xx from the token endpoint. Stored state is untouched.
    #[error("transient token endpoint failure: {0}")]
    RetryableAuth(String),

    /// The refresh token was revoked or expired.
    #[error("refresh token rejected: {0}")]
    InvalidGrant(OAuthRejection),

    /// Consent denied, bad client credentials, or an expired/used code.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(OAuthRejection),

    #[error("no authorization code received within {}s", .0.as_secs())]
    AuthorizationTimedOut(Duration),

    #[error("callback listener error: {0}")]
    Listener(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Take the in-memory credential out of a `Persistence` error.
    pub fn into_unsaved(self) -> std::result::Result<Credential, Self> {
        match self {
            Error::Persistence {
                unsaved: Some(credential),
                ..
            } => Ok(*credential),
            other => Err(other),
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
