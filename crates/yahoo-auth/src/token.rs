//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (initial OAuth flow completion)
//! 2. Token refresh (when the stored access token is stale)
//!
//! Both operations POST a form to the token endpoint with the client
//! credentials in the body. Failures are classified at this boundary so the
//! session can tell a revoked refresh token from a flaky network.

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::constants::{AUTHORIZE_ENDPOINT, DEFAULT_SCOPE, OOB_REDIRECT_URI, TOKEN_ENDPOINT};
use crate::error::{Error, OAuthRejection, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// converts this to an absolute unix millisecond timestamp when storing
/// the credential.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Omitted by some servers on refresh; the previous one is then retained.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub xoauth_yahoo_guid: Option<String>,
}

/// Error body of a failed token request (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Which grant a failed request was for. Only a refresh can yield `InvalidGrant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

/// Client registration and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
}

impl OAuthSettings {
    /// Settings for the Yahoo endpoints with the out-of-band redirect.
    pub fn yahoo(client_id: impl Into<String>, client_secret: Secret<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: OOB_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// Token endpoint client.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    settings: OAuthSettings,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, settings: OAuthSettings) -> Self {
        Self { http, settings }
    }

    /// Build the authorization URL the user opens in a browser.
    ///
    /// `state` is an opaque CSRF value returned unchanged on the redirect.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.settings.authorize_endpoint).map_err(|e| {
            Error::AuthorizationFailed(OAuthRejection::new(
                "invalid_request",
                Some(format!("invalid authorize endpoint: {e}")),
            ))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.settings.client_id)
                .append_pair("redirect_uri", &self.settings.redirect_uri)
                .append_pair("response_type", "code");
            if !self.settings.scope.is_empty() {
                query.append_pair("scope", &self.settings.scope);
            }
            query.append_pair("state", state);
        }
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens (initial OAuth flow).
    ///
    /// Every rejection, including `invalid_grant` for an expired or already
    /// used code, is an `AuthorizationFailed`.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose().as_str()),
        ];
        self.post(&form, Grant::AuthorizationCode).await
    }

    /// Refresh an access token using a refresh token.
    pub async fn refresh_token(&self, refresh: &str) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose().as_str()),
        ];
        self.post(&form, Grant::RefreshToken).await
    }

    async fn post(&self, form: &[(&str, &str)], grant: Grant) -> Result<TokenResponse> {
        debug!(endpoint = %self.settings.token_endpoint, ?grant, "token request");
        let response = self
            .http
            .post(&self.settings.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::RetryableAuth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(classify_failure(status.as_u16(), &body, grant));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::RetryableAuth(format!("reading token response: {e}")))?;
        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            Error::AuthorizationFailed(OAuthRejection::new(
                "invalid_response",
                Some(format!("invalid token response: {e}")),
            ))
        })?;
        if token.access_token.is_empty() {
            return Err(Error::AuthorizationFailed(OAuthRejection::new(
                "invalid_response",
                Some("token response carried an empty access_token".into()),
            )));
        }
        Ok(token)
    }
}

/// Map a non-success token endpoint response onto the error taxonomy.
fn classify_failure(status: u16, body: &str, grant: Grant) -> Error {
    if status == 429 || status >= 500 {
        return Error::RetryableAuth(format!("token endpoint returned {status}: {body}"));
    }

    let rejection = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => OAuthRejection::new(parsed.error, parsed.error_description),
        Err(_) => {
            // 401/403 without a structured body means the refresh token is
            // revoked or invalid
            if grant == Grant::RefreshToken && (status == 401 || status == 403) {
                return Error::InvalidGrant(OAuthRejection::new(
                    "invalid_grant",
                    Some(format!("token endpoint returned {status}: {body}")),
                ));
            }
            OAuthRejection::new(
                format!("http_{status}"),
                (!body.trim().is_empty()).then(|| body.trim().to_string()),
            )
        }
    };

    if grant == Grant::RefreshToken && is_invalid_grant(&rejection.code) {
        Error::InvalidGrant(rejection)
    } else {
        Error::AuthorizationFailed(rejection)
    }
}

fn is_invalid_grant(code: &str) -> bool {
    code.eq_ignore_ascii_case("invalid_grant") || code.eq_ignore_ascii_case("invalid_refresh_token")
}
