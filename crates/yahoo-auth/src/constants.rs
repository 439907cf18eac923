//! Yahoo OAuth2 endpoint defaults
//!
//! These identify public endpoints only. Client id and secret come from the
//! environment; tokens live in the token file managed by `TokenStore`.

/// Authorization endpoint the user visits in a browser
pub const AUTHORIZE_ENDPOINT: &str = "https://api.login.yahoo.com/oauth2/request_auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://api.login.yahoo.com/oauth2/get_token";

/// Out-of-band redirect: Yahoo shows the code on a page for copy-paste.
pub const OOB_REDIRECT_URI: &str = "oob";

/// Read access to Fantasy Sports data.
pub const DEFAULT_SCOPE: &str = "fspt-r";

/// Token type written when the server omits one.
pub const BEARER: &str = "bearer";

/// Clock-skew margin: a credential with less lifetime than this left is stale.
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

/// Bound on the wait for the user to finish login and consent.
pub const DEFAULT_AUTHORIZATION_TIMEOUT_SECS: u64 = 300;
