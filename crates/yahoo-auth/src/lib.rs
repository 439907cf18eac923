//! Yahoo OAuth2 credential bootstrap
//!
//! Obtains, persists, and refreshes the bearer credential used for the
//! fantasy sports API. The crate has no dependency on the CLI binary and is
//! tested on its own against an in-process token endpoint.
//!
//! Credential flow:
//! 1. `AuthSession::ensure_token()` loads the file behind `TokenStore`
//! 2. `TokenState::classify()` decides between valid, stale, and absent
//! 3. Stale credentials go through `OAuthClient::refresh_token()`
//! 4. Absent or unrecoverable ones run the authorization-code flow, with the
//!    code arriving through a `CodePrompt` or the local `CallbackListener`
//! 5. Whatever was obtained is written back via `TokenStore::save()`

pub mod callback;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod session;
pub mod state;
pub mod token;

#[cfg(test)]
mod test_support;

pub use callback::{CallbackSettings, TlsFiles};
pub use constants::*;
pub use credentials::{Credential, TokenState, TokenStore, unix_millis};
pub use error::{Error, OAuthRejection, Result};
pub use session::{AuthSession, AuthorizationFlow, CodeDelivery, CodePrompt, PromptFuture, UrlOpener};
pub use token::{OAuthClient, OAuthSettings, TokenResponse};
