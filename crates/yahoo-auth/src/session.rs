//! Auth session: produce a currently valid credential
//!
//! `ensure_token` does the minimum needed to hand back a valid credential:
//! nothing, a refresh exchange, or the full authorization-code flow.
//!
//! ```text
//! load ─┬─ absent / corrupt / unrecoverable ──────────────► authorize
//!       ├─ stale ── refresh ─┬─ ok ──────────────────────► persist
//!       │                    ├─ invalid grant ───────────► authorize (once)
//!       │                    └─ transient ───────────────► RetryableAuth
//!       └─ valid ────────────────────────────────────────► return (no network)
//! ```
//!
//! The store is passed in explicitly; the session keeps no cached copy of
//! the credential. A mutex serializes the load-classify-refresh-save sequence
//! so two callers cannot both discover staleness and spend the same refresh
//! token twice.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::callback::{CallbackListener, CallbackSettings};
use crate::constants::{DEFAULT_AUTHORIZATION_TIMEOUT_SECS, DEFAULT_REFRESH_MARGIN_SECS};
use crate::credentials::{Credential, TokenState, TokenStore, unix_millis};
use crate::error::{Error, OAuthRejection, Result};
use crate::state::generate_state;
use crate::token::OAuthClient;

/// Future returned by `CodePrompt::read_code`.
pub type PromptFuture<'a> = Pin<Box<dyn Future<Output = std::io::Result<String>> + Send + 'a>>;

/// Presents the authorization URL to the user (open a browser, print it, ...).
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Obtains a code the user copies by hand from the provider's page.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn CodePrompt>`).
pub trait CodePrompt: Send + Sync {
    /// Read the code (or the full redirect URL) for the given authorization URL.
    fn read_code<'a>(&'a self, authorization_url: &'a str) -> PromptFuture<'a>;
}

/// How the authorization code reaches the session.
#[derive(Clone)]
pub enum CodeDelivery {
    /// The user pastes the code.
    Manual(Arc<dyn CodePrompt>),
    /// A local listener captures the redirect. `fallback` is used when the
    /// listener cannot be bound.
    Callback {
        settings: CallbackSettings,
        fallback: Option<Arc<dyn CodePrompt>>,
    },
}

/// Interactive part of the authorization-code flow.
#[derive(Clone)]
pub struct AuthorizationFlow {
    pub opener: Arc<dyn UrlOpener>,
    pub delivery: CodeDelivery,
    /// Upper bound on the wait for the user.
    pub timeout: Duration,
}

impl AuthorizationFlow {
    pub fn new(opener: Arc<dyn UrlOpener>, delivery: CodeDelivery) -> Self {
        Self {
            opener,
            delivery,
            timeout: Duration::from_secs(DEFAULT_AUTHORIZATION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct AuthSession {
    store: TokenStore,
    oauth: OAuthClient,
    flow: AuthorizationFlow,
    refresh_margin: Duration,
    serialize: Mutex<()>,
}

impl AuthSession {
    pub fn new(store: TokenStore, oauth: OAuthClient, flow: AuthorizationFlow) -> Self {
        Self {
            store,
            oauth,
            flow,
            refresh_margin: Duration::from_secs(DEFAULT_REFRESH_MARGIN_SECS),
            serialize: Mutex::new(()),
        }
    }

    /// Treat credentials with less than `margin` lifetime left as stale.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Classify the stored credential without touching the network.
    pub async fn current_state(&self) -> Result<TokenState> {
        let stored = self.store.load().await?;
        Ok(TokenState::classify(
            stored,
            unix_millis(),
            self.refresh_margin,
        ))
    }

    /// Return a credential whose access token is currently valid.
    ///
    /// A `Persistence` error carries the freshly obtained credential; it is
    /// usable for this process but was not saved.
    pub async fn ensure_token(&self) -> Result<Credential> {
        let _guard = self.serialize.lock().await;

        let stored = match self.store.load().await {
            Ok(stored) => stored,
            Err(Error::CorruptState(msg)) => {
                warn!(path = %self.store.path().display(), error = %msg, "discarding unreadable token file");
                None
            }
            Err(e) => return Err(e),
        };

        match TokenState::classify(stored, unix_millis(), self.refresh_margin) {
            TokenState::Valid(credential) => {
                debug!("stored credential is valid");
                Ok(credential)
            }
            TokenState::Stale(credential) => match self.refresh(&credential).await {
                Ok(refreshed) => self.persist(refreshed).await,
                Err(Error::InvalidGrant(rejection)) => {
                    warn!(%rejection, "refresh token rejected, discarding stored credential");
                    if let Err(e) = self.store.clear().await {
                        warn!(error = %e, "could not remove revoked credential");
                    }
                    self.run_authorization_flow().await
                }
                Err(e) => Err(e),
            },
            TokenState::Unrecoverable(_) => {
                warn!("stored credential cannot be refreshed, starting authorization");
                self.run_authorization_flow().await
            }
            TokenState::Absent => {
                info!("no stored credential, starting authorization");
                self.run_authorization_flow().await
            }
        }
    }

    /// Run the authorization flow regardless of the stored credential.
    pub async fn authorize(&self) -> Result<Credential> {
        let _guard = self.serialize.lock().await;
        self.run_authorization_flow().await
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh = credential.refresh_token.as_deref().unwrap_or_default();
        let requested_at = unix_millis();
        let response = self.oauth.refresh_token(refresh).await?;
        let refreshed = credential.refreshed(response, requested_at);
        info!(
            expires_in_secs = refreshed.remaining_millis(requested_at) / 1000,
            "refreshed access token"
        );
        Ok(refreshed)
    }

    async fn run_authorization_flow(&self) -> Result<Credential> {
        let state = generate_state();
        let code = match &self.flow.delivery {
            CodeDelivery::Manual(prompt) => self.prompt_for_code(prompt.as_ref(), &state).await?,
            CodeDelivery::Callback { settings, fallback } => {
                match CallbackListener::bind(settings).await {
                    Ok(listener) => {
                        let url = self.oauth.authorization_url(&state)?;
                        self.flow.opener.open(&url);
                        info!(addr = %listener.local_addr(), "waiting for authorization redirect");
                        let params = listener.wait(self.flow.timeout).await?;
                        params.into_code(&state)?
                    }
                    Err(e) => match fallback {
                        Some(prompt) => {
                            warn!(error = %e, "callback listener unavailable, falling back to manual code entry");
                            self.prompt_for_code(prompt.as_ref(), &state).await?
                        }
                        None => return Err(e),
                    },
                }
            }
        };

        let issued_at = unix_millis();
        let response = self.oauth.exchange_code(&code).await?;
        let credential = Credential::issued(response, issued_at);
        info!(
            expires_in_secs = credential.remaining_millis(issued_at) / 1000,
            "authorization code exchanged"
        );
        self.persist(credential).await
    }

    async fn prompt_for_code(&self, prompt: &dyn CodePrompt, state: &str) -> Result<String> {
        let url = self.oauth.authorization_url(state)?;
        self.flow.opener.open(&url);

        let input = tokio::time::timeout(self.flow.timeout, prompt.read_code(&url))
            .await
            .map_err(|_| Error::AuthorizationTimedOut(self.flow.timeout))?
            .map_err(|e| Error::Io(format!("reading authorization code: {e}")))?;

        extract_code(&input)
    }

    async fn persist(&self, credential: Credential) -> Result<Credential> {
        match self.store.save(&credential).await {
            Ok(()) => Ok(credential),
            Err(Error::Persistence { reason, .. }) => {
                warn!(error = %reason, "credential obtained but not persisted");
                Err(Error::Persistence {
                    reason,
                    unsaved: Some(Box::new(credential)),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Pull the authorization code out of manual input.
///
/// Accepts the bare code or the full redirect URL the browser landed on.
fn extract_code(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::AuthorizationFailed(OAuthRejection::new(
            "invalid_request",
            Some("no authorization code entered".into()),
        )));
    }

    let Ok(url) = Url::parse(input) else {
        return Ok(input.to_string());
    };
    if url.cannot_be_a_base() {
        return Ok(input.to_string());
    }

    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(Error::AuthorizationFailed(OAuthRejection::new(error, description)));
    }
    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        Error::AuthorizationFailed(OAuthRejection::new(
            "invalid_request",
            Some("redirect URL carried no code parameter".into()),
        ))
    })
}
