//! Token endpoint transport
//!
//! [`TokenEndpoint`] is the only place this crate touches the network. The
//! lifecycle manager is generic over it so hosts can swap the transport and
//! tests can count grant requests.

use super::config::OAuthConfig;
use super::token::TokenResponse;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while talking to the token endpoint
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Network or HTTP client failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("Token endpoint returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `error: error_description` from the body, or the status reason
        message: String,
    },

    /// 2xx response that is not a token response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Identity provider redirected back with an error instead of a code
    #[error("Authorization denied: {0}")]
    Denied(String),
}

/// OAuth error body (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorResponse {
    fn into_message(self) -> String {
        match self.error_description {
            Some(description) => format!("{}: {description}", self.error),
            None => self.error,
        }
    }
}

/// The two grants this crate issues
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Redeem an authorization code with its PKCE verifier
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, EndpointError>;

    /// Trade a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, EndpointError>;
}

#[async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for Arc<T> {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, EndpointError> {
        (**self).exchange_code(code, code_verifier).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, EndpointError> {
        (**self).refresh(refresh_token).await
    }
}

/// Form-encoded token endpoint over `reqwest`
///
/// No timeout is configured beyond the client default.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl HttpTokenEndpoint {
    /// Create an endpoint with a fresh HTTP client
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create an endpoint that shares an existing HTTP client
    #[must_use]
    pub fn with_client(config: OAuthConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Get the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<TokenResponse, EndpointError> {
        let response = self
            .http_client
            .post(self.config.token_url())
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(ErrorResponse::into_message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown status")
                        .to_string()
                });
            return Err(EndpointError::Status {
                status: status.as_u16(),
                message,
            });
        }

        // The body holds credentials, so only the parser error is reported
        serde_json::from_str(&body).map_err(|e| {
            EndpointError::InvalidResponse(format!("Failed to parse token response: {e}"))
        })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, EndpointError> {
        let scope = self.config.scope();
        self.post_form(&[
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, EndpointError> {
        let scope = self.config.scope();
        self.post_form(&[
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}
