//! Credential model and token file storage
//!
//! A single JSON file holds exactly one credential. All writes use atomic
//! temp-file + rename so a crash mid-write never leaves a truncated file
//! behind; `load` sees either the previous credential or the new one.
//!
//! The file carries a `version` field. Files written before versioning are
//! read as version 1; files from a newer format are reported as corrupt
//! rather than misread.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::BEARER;
use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// Current token file format version.
pub const TOKEN_FILE_VERSION: u32 = 1;

/// An OAuth credential.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
/// Computed at receipt time from `TokenResponse.expires_in` (seconds delta)
/// plus the current time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiration as unix timestamp in milliseconds
    pub expires_at: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Granted scopes, informational only
    #[serde(default)]
    pub scope: Vec<String>,
    /// Yahoo account GUID (`xoauth_yahoo_guid`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

fn default_token_type() -> String {
    BEARER.to_string()
}

impl Credential {
    /// Build a credential from an authorization-code exchange.
    pub fn issued(response: TokenResponse, now_millis: u64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            expires_at: expiry_millis(now_millis, response.expires_in),
            token_type: response.token_type.unwrap_or_else(default_token_type),
            scope: response.scope.as_deref().map(split_scope).unwrap_or_default(),
            guid: response.xoauth_yahoo_guid,
        }
    }

    /// Merge a refresh response into this credential.
    ///
    /// The access token and expiry are always replaced. The refresh token,
    /// scope and guid are replaced only when the response carries them.
    pub fn refreshed(&self, response: TokenResponse, now_millis: u64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .or_else(|| self.refresh_token.clone()),
            expires_at: expiry_millis(now_millis, response.expires_in),
            token_type: response
                .token_type
                .unwrap_or_else(|| self.token_type.clone()),
            scope: response
                .scope
                .as_deref()
                .map(split_scope)
                .unwrap_or_else(|| self.scope.clone()),
            guid: response.xoauth_yahoo_guid.or_else(|| self.guid.clone()),
        }
    }

    /// Value for the `Authorization` header of an API request.
    pub fn authorization_header(&self) -> String {
        if self.token_type.eq_ignore_ascii_case(BEARER) {
            format!("Bearer {}", self.access_token)
        } else {
            format!("{} {}", self.token_type, self.access_token)
        }
    }

    /// Milliseconds of lifetime left at `now_millis` (zero once expired).
    pub fn remaining_millis(&self, now_millis: u64) -> u64 {
        self.expires_at.saturating_sub(now_millis)
    }
}

// Tokens never appear in Debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("guid", &self.guid)
            .finish()
    }
}

fn expiry_millis(now_millis: u64, expires_in_secs: u64) -> u64 {
    now_millis.saturating_add(expires_in_secs.saturating_mul(1000))
}

fn split_scope(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// Current time as unix milliseconds.
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Classification of the stored credential.
///
/// Transitions driven by `AuthSession::ensure_token`:
/// - Absent / Unrecoverable → authorization flow
/// - Stale → refresh exchange (falls back to authorization on invalid grant)
/// - Valid → returned as is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid(Credential),
    Stale(Credential),
    Unrecoverable(Credential),
}

impl TokenState {
    /// Classify a credential at `now_millis`.
    ///
    /// A credential with less than `margin` of lifetime left is stale. An empty
    /// access token is malformed, and a stale credential without a refresh
    /// token cannot be renewed; both are unrecoverable.
    pub fn classify(credential: Option<Credential>, now_millis: u64, margin: Duration) -> Self {
        let Some(credential) = credential else {
            return TokenState::Absent;
        };

        if credential.access_token.is_empty() {
            return TokenState::Unrecoverable(credential);
        }

        let margin_millis = u64::try_from(margin.as_millis()).unwrap_or(u64::MAX);
        if now_millis.saturating_add(margin_millis) < credential.expires_at {
            return TokenState::Valid(credential);
        }

        match credential.refresh_token.as_deref() {
            Some(refresh) if !refresh.is_empty() => TokenState::Stale(credential),
            _ => TokenState::Unrecoverable(credential),
        }
    }

    /// State label for status output and logging.
    pub fn label(&self) -> &'static str {
        match self {
            TokenState::Absent => "absent",
            TokenState::Valid(_) => "valid",
            TokenState::Stale(_) => "stale",
            TokenState::Unrecoverable(_) => "unrecoverable",
        }
    }
}

/// On-disk form: the credential plus a format version.
#[derive(Serialize, Deserialize)]
struct TokenFile {
    #[serde(default = "legacy_version")]
    version: u32,
    #[serde(flatten)]
    credential: Credential,
}

fn legacy_version() -> u32 {
    1
}

/// Token file manager.
///
/// Holds no in-memory copy: every `load` reads the file, so callers always
/// see the latest persisted credential.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted credential.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet. Returns
    /// `CorruptState` when the file exists but cannot be parsed into a
    /// credential of a supported version.
    pub async fn load(&self) -> Result<Option<Credential>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "token file not found");
                return Ok(None);
            }
            // Something is on the path but its content can't be read as a file
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::InvalidData | std::io::ErrorKind::IsADirectory
                ) =>
            {
                return Err(Error::CorruptState(format!("reading token file: {e}")));
            }
            Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
        };

        let file: TokenFile = serde_json::from_slice(&contents)
            .map_err(|e| Error::CorruptState(format!("parsing token file: {e}")))?;

        if file.version > TOKEN_FILE_VERSION {
            return Err(Error::CorruptState(format!(
                "token file version {} is newer than supported version {TOKEN_FILE_VERSION}",
                file.version
            )));
        }

        debug!(path = %self.path.display(), version = file.version, "loaded credential");
        Ok(Some(file.credential))
    }

    /// Overwrite the persisted credential.
    ///
    /// Uses atomic write (temp file + rename). File permissions are set to
    /// 0600 (owner read/write only). On failure the previous file, if any, is
    /// left intact.
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            credential: credential.clone(),
        };
        write_atomic(&self.path, &file).await?;
        info!(path = %self.path.display(), "persisted credential");
        Ok(())
    }

    /// Delete the persisted credential. A missing file is not an error.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "removed token file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Persistence {
                reason: format!("removing token file: {e}"),
                unsaved: None,
            }),
        }
    }
}

fn persistence(reason: String) -> Error {
    Error::Persistence {
        reason,
        unsaved: None,
    }
}

/// Write the token file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. The temporary file is removed if any step fails.
async fn write_atomic(path: &Path, data: &TokenFile) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| persistence(format!("serializing credential: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "token.json".into());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let result = write_then_rename(&tmp_path, path, json.as_bytes()).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_then_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(tmp_path, bytes)
        .await
        .map_err(|e| persistence(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(tmp_path, perms)
            .await
            .map_err(|e| persistence(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| persistence(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "wrote token file");
    Ok(())
}
