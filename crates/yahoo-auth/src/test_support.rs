//! In-process token endpoint and interactive fakes for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use common::Secret;
use tokio::sync::Mutex;

use crate::session::{CodePrompt, PromptFuture, UrlOpener};
use crate::token::OAuthSettings;

pub(crate) fn test_settings(token_endpoint: &str) -> OAuthSettings {
    OAuthSettings {
        token_endpoint: token_endpoint.into(),
        ..OAuthSettings::yahoo("test-client", Secret::new("test-secret".to_string()))
    }
}

/// Canned token endpoint reply.
#[derive(Debug, Clone)]
pub(crate) struct TokenReply {
    status: u16,
    body: String,
}

impl TokenReply {
    pub(crate) fn ok(access: &str, refresh: Option<&str>, expires_in: u64) -> Self {
        let mut body = serde_json::json!({
            "access_token": access,
            "expires_in": expires_in,
            "token_type": "bearer",
        });
        if let Some(refresh) = refresh {
            body["refresh_token"] = refresh.into();
        }
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub(crate) fn error(status: u16, code: &str, description: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": code, "error_description": description })
                .to_string(),
        }
    }

    pub(crate) fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone)]
struct MockState {
    code_reply: Arc<Mutex<TokenReply>>,
    refresh_reply: Arc<Mutex<TokenReply>>,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

/// Token endpoint served by axum on `127.0.0.1:0`, recording every form it receives.
pub(crate) struct MockTokenEndpoint {
    pub(crate) url: String,
    state: MockState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockTokenEndpoint {
    pub(crate) async fn start() -> Self {
        let unconfigured = TokenReply::error(500, "server_error", "no reply configured");
        let state = MockState {
            code_reply: Arc::new(Mutex::new(unconfigured.clone())),
            refresh_reply: Arc::new(Mutex::new(unconfigured)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/token", post(token_handler))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/token"),
            state,
            handle,
        }
    }

    pub(crate) async fn set_code_reply(&self, reply: TokenReply) {
        *self.state.code_reply.lock().await = reply;
    }

    pub(crate) async fn set_refresh_reply(&self, reply: TokenReply) {
        *self.state.refresh_reply.lock().await = reply;
    }

    pub(crate) async fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state.requests.lock().await.clone()
    }

    /// Number of requests received for a grant type.
    pub(crate) async fn grant_count(&self, grant_type: &str) -> usize {
        self.state
            .requests
            .lock()
            .await
            .iter()
            .filter(|form| form.get("grant_type").map(String::as_str) == Some(grant_type))
            .count()
    }
}

impl Drop for MockTokenEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn token_handler(
    State(state): State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let reply = match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => state.refresh_reply.lock().await.clone(),
        _ => state.code_reply.lock().await.clone(),
    };
    state.requests.lock().await.push(form);

    (
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response()
}

/// Prompt that answers with a fixed code, or never answers.
pub(crate) struct FakePrompt {
    answer: Option<String>,
    calls: AtomicUsize,
}

impl FakePrompt {
    pub(crate) fn answering(code: &str) -> Self {
        Self {
            answer: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn silent() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CodePrompt for FakePrompt {
    fn read_code<'a>(&'a self, _authorization_url: &'a str) -> PromptFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.clone();
        Box::pin(async move {
            match answer {
                Some(code) => Ok(code),
                None => std::future::pending().await,
            }
        })
    }
}

/// Opener that records the URLs it was asked to open.
#[derive(Default)]
pub(crate) struct RecordingOpener {
    urls: std::sync::Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }
}
