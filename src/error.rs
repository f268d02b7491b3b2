//! Error types for sign-in and token management

use crate::auth::{EndpointError, TokenError};
use std::sync::Arc;
use thiserror::Error;

/// Failures of the token lifecycle
///
/// None of these are retried internally. `RefreshFailed` and `NoCredentials`
/// leave the caller's token set untouched.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Code completion attempted without a prior `begin_authorization`
    #[error("No authorization flow is pending; start sign-in again")]
    NoPendingFlow,

    /// Code exchange failed; the attempt is spent and sign-in must restart
    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(#[source] EndpointError),

    /// Refresh failed; the session is expired and needs a full sign-in
    ///
    /// The cause is shared by every caller that waited on the same refresh.
    #[error("Session expired, token refresh failed: {0}")]
    RefreshFailed(#[source] Arc<EndpointError>),

    /// The access token needs refreshing but there is no refresh token
    #[error("Not signed in (no refresh token available)")]
    NoCredentials,
}

impl AuthError {
    /// Whether the caller has to send the user through sign-in again
    #[must_use]
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::RefreshFailed(_) | Self::NoCredentials)
    }
}

/// Errors from [`Session`](crate::Session), which adds persistence to the lifecycle
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token lifecycle failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Persisting or loading tokens failed
    #[error("Token storage error: {0}")]
    Storage(#[from] TokenError),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
