//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from YAHOO_CLIENT_SECRET or client_secret_file,
//! never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use yahoo_auth::{CallbackSettings, OAuthSettings, TlsFiles};

const CLIENT_ID_ENV: &str = "YAHOO_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "YAHOO_CLIENT_SECRET";
const CONFIG_PATH_ENV: &str = "FANTASY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "fantasy-players.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub oauth: OAuthConfig,
    pub callback: Option<CallbackConfig>,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

/// Application registration and token endpoint settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to YAHOO_CLIENT_SECRET)
    pub client_secret_file: Option<PathBuf>,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
    pub scope: String,
    pub refresh_margin_secs: u64,
    pub authorization_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            client_secret_file: None,
            authorize_endpoint: yahoo_auth::AUTHORIZE_ENDPOINT.into(),
            token_endpoint: yahoo_auth::TOKEN_ENDPOINT.into(),
            redirect_uri: yahoo_auth::OOB_REDIRECT_URI.into(),
            scope: yahoo_auth::DEFAULT_SCOPE.into(),
            refresh_margin_secs: yahoo_auth::DEFAULT_REFRESH_MARGIN_SECS,
            authorization_timeout_secs: yahoo_auth::DEFAULT_AUTHORIZATION_TIMEOUT_SECS,
        }
    }
}

/// Local redirect listener. Absent means manual code entry.
#[derive(Debug, Deserialize)]
pub struct CallbackConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_callback_path")]
    pub path: String,
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub fallback_to_manual: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub token_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            snapshot_dir: PathBuf::from("data/json"),
            export_dir: PathBuf::from("data/exports"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub game_code: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: fantasy_api::constants::BASE_URL.into(),
            game_code: fantasy_api::constants::DEFAULT_GAME_CODE.into(),
            timeout_secs: fantasy_api::constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_callback_path() -> String {
    "/callback".into()
}

fn default_true() -> bool {
    true
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is an error only when `must_exist` is set (the path was
    /// given explicitly); otherwise every setting takes its default.
    ///
    /// Client secret resolution order:
    /// 1. YAHOO_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path, must_exist: bool) -> common::Result<Self> {
        let mut config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !must_exist => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.validate()?;

        // Resolve client id: env var takes precedence over file
        if let Ok(id) = std::env::var(CLIENT_ID_ENV) {
            let id = id.trim().to_owned();
            if !id.is_empty() {
                config.oauth.client_id = Some(id);
            }
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        require_http_url("oauth.authorize_endpoint", &self.oauth.authorize_endpoint)?;
        require_http_url("oauth.token_endpoint", &self.oauth.token_endpoint)?;
        require_http_url("api.base_url", &self.api.base_url)?;

        if self.oauth.authorization_timeout_secs == 0 {
            return Err(common::Error::Config(
                "authorization_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(callback) = &self.callback {
            if callback.tls_cert.is_some() != callback.tls_key.is_some() {
                return Err(common::Error::Config(
                    "callback.tls_cert and callback.tls_key must be set together".into(),
                ));
            }
            if !callback.path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "callback.path must start with '/', got: {}",
                    callback.path
                )));
            }
            if self.oauth.redirect_uri == yahoo_auth::OOB_REDIRECT_URI {
                return Err(common::Error::Config(
                    "a [callback] section needs oauth.redirect_uri pointing at the listener".into(),
                ));
            }
        }

        Ok(())
    }

    /// Token endpoint settings. Fails when the client id or secret is missing;
    /// only commands that talk to the token endpoint need them.
    pub fn oauth_settings(&self) -> common::Result<OAuthSettings> {
        let client_id = self.oauth.client_id.clone().ok_or_else(|| {
            common::Error::MissingCredential(format!(
                "client id (set {CLIENT_ID_ENV} or oauth.client_id)"
            ))
        })?;
        let client_secret = self.oauth.client_secret.clone().ok_or_else(|| {
            common::Error::MissingCredential(format!(
                "client secret (set {CLIENT_SECRET_ENV} or oauth.client_secret_file)"
            ))
        })?;

        Ok(OAuthSettings {
            client_id,
            client_secret,
            redirect_uri: self.oauth.redirect_uri.clone(),
            scope: self.oauth.scope.clone(),
            authorize_endpoint: self.oauth.authorize_endpoint.clone(),
            token_endpoint: self.oauth.token_endpoint.clone(),
        })
    }

    /// Resolve config file path from CLI arg or FANTASY_CONFIG env var.
    ///
    /// The flag reports whether the path was chosen explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}

impl CallbackConfig {
    pub fn settings(&self) -> CallbackSettings {
        CallbackSettings {
            listen_addr: self.listen_addr,
            path: self.path.clone(),
            tls: match (&self.tls_cert, &self.tls_key) {
                (Some(cert), Some(key)) => Some(TlsFiles {
                    cert: cert.clone(),
                    key: key.clone(),
                }),
                _ => None,
            },
        }
    }
}
