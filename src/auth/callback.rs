//! Parsed redirect callback
//!
//! The host receives the redirect (custom URL scheme, loopback server, pasted
//! text); this module only turns it into an [`AuthCallback`].

use url::Url;
use thiserror::Error;

/// Errors parsing a redirect URL
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackError {
    /// Input is not a URL
    #[error("Invalid redirect URL: {0}")]
    InvalidUrl(String),

    /// Neither `code` nor `error` present in the query
    #[error("Redirect carries neither an authorization code nor an error")]
    MissingCode,
}

/// Outcome delivered to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCallback {
    /// User approved; redeem this code
    Code(String),
    /// Provider refused or the user cancelled
    Error {
        /// OAuth error code, e.g. `access_denied`
        error: String,
        /// Human readable detail, if the provider sent one
        description: Option<String>,
    },
}

impl AuthCallback {
    /// Parse a full redirect URL such as `obsidian://mstodo-auth?code=...`
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::InvalidUrl`] if `url` does not parse and
    /// [`CallbackError::MissingCode`] if its query has neither `code` nor
    /// `error`.
    pub fn from_redirect_url(url: &str) -> Result<Self, CallbackError> {
        let parsed = Url::parse(url.trim()).map_err(|e| CallbackError::InvalidUrl(e.to_string()))?;

        let mut code = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        // An error wins over a code; providers never send both on success
        if let Some(error) = error.filter(|e| !e.is_empty()) {
            return Ok(Self::Error { error, description });
        }
        code.filter(|c| !c.is_empty())
            .map(Self::Code)
            .ok_or(CallbackError::MissingCode)
    }

    /// Interpret pasted input: a redirect URL, or a bare authorization code
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::MissingCode`] for blank input, or any error
    /// from [`AuthCallback::from_redirect_url`] when the input contains `://`.
    pub fn from_user_input(input: &str) -> Result<Self, CallbackError> {
        let input = input.trim();
        if input.contains("://") {
            Self::from_redirect_url(input)
        } else if input.is_empty() {
            Err(CallbackError::MissingCode)
        } else {
            Ok(Self::Code(input.to_string()))
        }
    }
}
