//! Token set and token endpoint response types

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Remaining validity below which an access token is refreshed before use
///
/// Covers clock skew between host and provider plus the latency of the request
/// the token is about to be attached to.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Current Unix time in seconds
#[must_use]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Successful response from the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// New bearer token
    pub access_token: String,
    /// Replacement refresh token; absent means "keep the previous one"
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds
    pub expires_in: u64,
    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Usually `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Credentials for the signed-in identity
///
/// `expires_at` is always issuance time plus the server-declared lifetime.
/// A cleared set has an empty access token, no refresh token and
/// `expires_at == 0`; the three fields only ever change together.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Unix timestamp (seconds) when the access token expires
    #[serde(default)]
    pub expires_at: u64,
}

impl TokenSet {
    /// Build a token set from a token endpoint response issued at `issued_at`
    ///
    /// `previous_refresh_token` is kept when the response does not carry a
    /// new one.
    #[must_use]
    pub fn from_response(
        response: TokenResponse,
        previous_refresh_token: Option<&str>,
        issued_at: u64,
    ) -> Self {
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh_token.map(ToString::to_string));

        Self {
            access_token: response.access_token,
            refresh_token,
            expires_at: issued_at.saturating_add(response.expires_in),
        }
    }

    /// The refresh token, if one is present and non-empty
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether the access token must be refreshed before use at time `now`
    #[must_use]
    pub fn needs_refresh_at(&self, now: u64) -> bool {
        self.expires_at.saturating_sub(now) < REFRESH_MARGIN.as_secs()
    }

    /// Whether the access token must be refreshed before use
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(now_secs())
    }

    /// Get remaining validity duration, `None` once expired
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let now = now_secs();
        (self.expires_at > now).then(|| Duration::from_secs(self.expires_at - now))
    }

    /// True for a cleared (signed-out) set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_none() && self.expires_at == 0
    }

    /// Reset all three fields in one assignment
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        bearer_header(&self.access_token)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |present: bool| if present { "<redacted>" } else { "<empty>" };
        f.debug_struct("TokenSet")
            .field("access_token", &redact(!self.access_token.is_empty()))
            .field("refresh_token", &redact(self.refresh_token().is_some()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// `Authorization` header value for a bearer token
#[must_use]
pub fn bearer_header(access_token: &str) -> String {
    format!("Bearer {access_token}")
}
