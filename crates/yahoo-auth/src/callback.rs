//! One-shot local listener for the OAuth redirect
//!
//! Binds immediately before the authorization URL is presented and accepts
//! a single redirect carrying `code` + `state` (or `error`). The listener is
//! shut down and its task joined on every exit path, so the port is free
//! again when `wait` returns. Dropping an unused listener aborts it.
//!
//! Serves HTTPS when a PEM certificate/key pair is configured (Yahoo only
//! redirects to https URLs), plain HTTP otherwise.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use serde::Deserialize;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, OAuthRejection, Result};
use crate::state::state_matches;

/// How long in-flight responses get to finish once the redirect arrived.
const RESPONSE_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Authorized</title></head>\
<body><h1>Authorization complete</h1><p>You may close this window and return to the terminal.</p></body></html>";

const ERROR_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Authorization failed</title></head>\
<body><h1>Authorization failed</h1><p>Return to the terminal for details.</p></body></html>";

const MISSING_CODE_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Bad request</title></head>\
<body><h1>Missing authorization code</h1></body></html>";

/// PEM certificate chain and private key for the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Where and how the callback listener binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSettings {
    pub listen_addr: SocketAddr,
    /// Route the redirect arrives on, e.g. `/callback`
    pub path: String,
    pub tls: Option<TlsFiles>,
}

/// Query parameters of the redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Check the redirect against the expected state and return the code.
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::AuthorizationFailed(OAuthRejection::new(
                error,
                self.error_description,
            )));
        }

        let state_ok = self
            .state
            .as_deref()
            .is_some_and(|returned| state_matches(expected_state, returned));
        if !state_ok {
            return Err(Error::AuthorizationFailed(OAuthRejection::new(
                "state_mismatch",
                Some("redirect state does not match the authorization request".into()),
            )));
        }

        match self.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(Error::AuthorizationFailed(OAuthRejection::new(
                "invalid_request",
                Some("redirect carried no authorization code".into()),
            ))),
        }
    }
}

type Slot = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// A bound, serving callback listener waiting for one redirect.
pub struct CallbackListener {
    local_addr: SocketAddr,
    handle: Handle,
    server: Option<JoinHandle<std::io::Result<()>>>,
    receiver: oneshot::Receiver<CallbackParams>,
}

impl CallbackListener {
    /// Load TLS material (if configured), bind, and start serving.
    pub async fn bind(settings: &CallbackSettings) -> Result<Self> {
        let tls = match &settings.tls {
            Some(files) => Some(
                RustlsConfig::from_pem_file(&files.cert, &files.key)
                    .await
                    .map_err(|e| {
                        Error::Listener(format!(
                            "loading TLS cert {} / key {}: {e}",
                            files.cert.display(),
                            files.key.display()
                        ))
                    })?,
            ),
            None => None,
        };

        let listener = std::net::TcpListener::bind(settings.listen_addr)
            .map_err(|e| Error::Listener(format!("binding {}: {e}", settings.listen_addr)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::Listener(format!("configuring listener: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Listener(format!("reading listener address: {e}")))?;

        let (sender, receiver) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(sender)));
        let app = callback_router(&settings.path, slot);
        let handle = Handle::new();

        let server = match tls {
            Some(config) => {
                let server =
                    axum_server::tls_rustls::from_tcp_rustls(listener, config).handle(handle.clone());
                tokio::spawn(server.serve(app.into_make_service()))
            }
            None => {
                let server = axum_server::from_tcp(listener).handle(handle.clone());
                tokio::spawn(server.serve(app.into_make_service()))
            }
        };

        info!(
            addr = %local_addr,
            path = %settings.path,
            tls = settings.tls.is_some(),
            "callback listener bound"
        );

        Ok(Self {
            local_addr,
            handle,
            server: Some(server),
            receiver,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait up to `timeout` for the redirect, then close the listener.
    pub async fn wait(mut self, timeout: Duration) -> Result<CallbackParams> {
        let outcome = tokio::time::timeout(timeout, &mut self.receiver).await;
        self.close(matches!(outcome, Ok(Ok(_)))).await;

        match outcome {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(Error::Listener(
                "callback listener stopped before a redirect arrived".into(),
            )),
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "no redirect received, callback listener closed"
                );
                Err(Error::AuthorizationTimedOut(timeout))
            }
        }
    }

    /// Stop serving and join the server task so the socket is released.
    async fn close(&mut self, graceful: bool) {
        if graceful {
            self.handle.graceful_shutdown(Some(RESPONSE_GRACE));
        } else {
            self.handle.shutdown();
        }
        if let Some(server) = self.server.take() {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "callback listener exited with error"),
                Err(e) => warn!(error = %e, "callback listener task failed"),
            }
        }
        debug!(addr = %self.local_addr, "callback listener closed");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            self.handle.shutdown();
            server.abort();
        }
    }
}

fn callback_router(path: &str, slot: Slot) -> Router {
    Router::new()
        .route(path, get(callback_handler))
        .with_state(slot)
}

/// Hand the first redirect with a code or error to the waiting flow.
///
/// Requests carrying neither (health checks, reloads without a query) are answered
/// with 400 and do not consume the one-shot slot.
async fn callback_handler(
    State(slot): State<Slot>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    if params.code.is_none() && params.error.is_none() {
        return (StatusCode::BAD_REQUEST, Html(MISSING_CODE_HTML));
    }

    let Some(sender) = slot.lock().await.take() else {
        return (StatusCode::GONE, Html(ERROR_HTML));
    };

    let failed = params.error.is_some();
    if sender.send(params).is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, Html(ERROR_HTML));
    }

    if failed {
        (StatusCode::BAD_REQUEST, Html(ERROR_HTML))
    } else {
        (StatusCode::OK, Html(SUCCESS_HTML))
    }
}
