//! Authorization flow and access token lifecycle

use super::callback::AuthCallback;
use super::config::OAuthConfig;
use super::endpoint::{EndpointError, HttpTokenEndpoint, TokenEndpoint};
use super::pkce::{CHALLENGE_METHOD, PkceParameters};
use super::token::{TokenSet, now_secs};
use crate::error::AuthError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

type RefreshOutcome = Result<TokenSet, Arc<EndpointError>>;

/// Older refresh tokens remembered per flight
const MAX_SUPERSEDED: usize = 8;

/// One refresh grant, shared by every caller holding the same refresh token
struct RefreshFlight {
    id: u64,
    refresh_token: String,
    /// Refresh tokens rotated away by earlier flights this one continues
    superseded: Vec<String>,
    outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

impl RefreshFlight {
    /// Whether a caller presenting `refresh_token` belongs to this flight
    fn serves(&self, refresh_token: &str) -> bool {
        self.refresh_token == refresh_token
            || self.superseded.iter().any(|t| t == refresh_token)
            || matches!(
                self.outcome.peek(),
                Some(Ok(tokens)) if tokens.refresh_token() == Some(refresh_token)
            )
    }
}

/// Result of [`TokenLifecycleManager::get_valid_access_token`]
#[derive(Clone, PartialEq, Eq)]
pub enum ValidAccessToken {
    /// The caller's token is valid beyond the refresh margin
    Current(String),
    /// A refresh happened; persist this set before using its access token
    Refreshed(TokenSet),
}

impl ValidAccessToken {
    /// The bearer token to send
    #[must_use]
    pub fn access_token(&self) -> &str {
        match self {
            Self::Current(token) => token,
            Self::Refreshed(tokens) => &tokens.access_token,
        }
    }

    /// The new token set, if a refresh happened
    #[must_use]
    pub fn refreshed(&self) -> Option<&TokenSet> {
        match self {
            Self::Current(_) => None,
            Self::Refreshed(tokens) => Some(tokens),
        }
    }
}

impl std::fmt::Debug for ValidAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current(_) => f.write_str("Current(<redacted>)"),
            Self::Refreshed(tokens) => f.debug_tuple("Refreshed").field(tokens).finish(),
        }
    }
}

/// Owns the PKCE round-trip and decides when cached tokens are usable
///
/// At most one authorization attempt is pending at a time, and concurrent
/// refreshes of the same refresh token collapse into a single grant request.
pub struct TokenLifecycleManager<E = HttpTokenEndpoint> {
    config: OAuthConfig,
    endpoint: Arc<E>,
    pending: Mutex<Option<PkceParameters>>,
    refresh: Mutex<Option<RefreshFlight>>,
    next_flight: AtomicU64,
}

impl TokenLifecycleManager<HttpTokenEndpoint> {
    /// Create a manager that talks to the configured token endpoint over HTTP
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let endpoint = HttpTokenEndpoint::new(config.clone());
        Self::with_endpoint(config, endpoint)
    }
}

impl<E: TokenEndpoint + 'static> TokenLifecycleManager<E> {
    /// Create a manager over a custom token endpoint
    #[must_use]
    pub fn with_endpoint(config: OAuthConfig, endpoint: E) -> Self {
        Self {
            config,
            endpoint: Arc::new(endpoint),
            pending: Mutex::new(None),
            refresh: Mutex::new(None),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Get the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Get the token endpoint
    #[must_use]
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Start a sign-in attempt and return the URL to open in a browser
    ///
    /// Replaces any attempt that is still pending; a code issued for the
    /// replaced attempt will be rejected by the provider.
    pub fn begin_authorization(&self) -> String {
        let pkce = PkceParameters::generate();
        let url = self.authorization_url(&pkce.challenge);

        if lock(&self.pending).replace(pkce).is_some() {
            debug!("Replaced pending authorization flow");
        } else {
            debug!("Started authorization flow");
        }
        url
    }

    /// Whether a verifier is waiting for its authorization code
    #[must_use]
    pub fn has_pending_authorization(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Drop the pending verifier, if any
    pub fn abandon_authorization(&self) {
        if lock(&self.pending).take().is_some() {
            debug!("Abandoned pending authorization flow");
        }
    }

    /// Redeem an authorization code for tokens
    ///
    /// The pending verifier is consumed whether or not the exchange succeeds.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoPendingFlow`] without a prior
    /// [`begin_authorization`](Self::begin_authorization),
    /// [`AuthError::ExchangeFailed`] if the token endpoint call fails.
    pub async fn complete_authorization(&self, code: &str) -> Result<TokenSet, AuthError> {
        let pkce = lock(&self.pending).take().ok_or(AuthError::NoPendingFlow)?;

        let response = self
            .endpoint
            .exchange_code(code, &pkce.verifier)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authorization code exchange failed");
                AuthError::ExchangeFailed(e)
            })?;

        info!("Authorization code exchanged for tokens");
        Ok(TokenSet::from_response(response, None, now_secs()))
    }

    /// Redeem a parsed redirect callback
    ///
    /// # Errors
    ///
    /// As [`complete_authorization`](Self::complete_authorization). An error
    /// callback spends the pending attempt and yields
    /// [`AuthError::ExchangeFailed`] with [`EndpointError::Denied`].
    pub async fn handle_callback(&self, callback: AuthCallback) -> Result<TokenSet, AuthError> {
        match callback {
            AuthCallback::Code(code) => self.complete_authorization(&code).await,
            AuthCallback::Error { error, description } => {
                lock(&self.pending).take().ok_or(AuthError::NoPendingFlow)?;
                warn!(%error, "Authorization was refused");
                let message = match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                };
                Err(AuthError::ExchangeFailed(EndpointError::Denied(message)))
            }
        }
    }

    /// Return an access token that is valid for at least the refresh margin
    ///
    /// `current` is never modified. On a refresh the merged token set is
    /// returned in [`ValidAccessToken::Refreshed`] for the caller to persist.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoCredentials`] if a refresh is needed but `current` has
    /// no refresh token (no request is made), [`AuthError::RefreshFailed`] if
    /// the refresh grant fails.
    pub async fn get_valid_access_token(
        &self,
        current: &TokenSet,
    ) -> Result<ValidAccessToken, AuthError> {
        if !current.needs_refresh() {
            return Ok(ValidAccessToken::Current(current.access_token.clone()));
        }

        let Some(refresh_token) = current.refresh_token() else {
            debug!("Access token expiring and no refresh token available");
            return Err(AuthError::NoCredentials);
        };

        let (id, outcome) = self.join_or_start_refresh(refresh_token);
        match outcome.await {
            Ok(tokens) => Ok(ValidAccessToken::Refreshed(tokens)),
            Err(cause) => {
                // Failures are not cached; the caller's retry gets a new request
                self.finish_flight(id);
                Err(AuthError::RefreshFailed(cause))
            }
        }
    }

    /// Reset `tokens` and forget any pending flow or refresh
    pub fn clear(&self, tokens: &mut TokenSet) {
        tokens.clear();
        lock(&self.pending).take();
        lock(&self.refresh).take();
        info!("Credentials cleared");
    }

    fn join_or_start_refresh(
        &self,
        refresh_token: &str,
    ) -> (u64, Shared<BoxFuture<'static, RefreshOutcome>>) {
        let mut slot = lock(&self.refresh);
        let mut refresh_token = refresh_token.to_string();
        let mut superseded = Vec::new();

        if let Some(flight) = slot.as_ref().filter(|f| f.serves(&refresh_token)) {
            match flight.outcome.peek() {
                None => {
                    debug!("Joining in-flight token refresh");
                    return (flight.id, flight.outcome.clone());
                }
                Some(Ok(tokens)) if !tokens.needs_refresh() => {
                    debug!("Reusing completed token refresh");
                    return (flight.id, flight.outcome.clone());
                }
                // Already near expiry: continue from the newest refresh token
                // and keep answering callers that still hold an older one
                Some(Ok(tokens)) => {
                    superseded.clone_from(&flight.superseded);
                    superseded.push(flight.refresh_token.clone());
                    if let Some(rotated) = tokens.refresh_token() {
                        refresh_token = rotated.to_string();
                    }
                    superseded.retain(|t| *t != refresh_token);
                    let excess = superseded.len().saturating_sub(MAX_SUPERSEDED);
                    superseded.drain(..excess);
                }
                Some(Err(_)) => {}
            }
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let endpoint = Arc::clone(&self.endpoint);
        let previous = refresh_token.clone();
        let outcome = async move {
            debug!("Refreshing access token");
            match endpoint.refresh(&previous).await {
                Ok(response) => {
                    info!("Access token refreshed");
                    Ok(TokenSet::from_response(response, Some(&previous), now_secs()))
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed");
                    Err(Arc::new(e))
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(RefreshFlight {
            id,
            refresh_token,
            superseded,
            outcome: outcome.clone(),
        });
        (id, outcome)
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = lock(&self.refresh);
        if slot.as_ref().is_some_and(|f| f.id == id) {
            *slot = None;
        }
    }

    fn authorization_url(&self, code_challenge: &str) -> String {
        let scope = self.config.scope();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_mode", "query"),
            ("scope", scope.as_str()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", CHALLENGE_METHOD),
        ];

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        format!("{}?{query}", self.config.authorize_url())
    }
}

impl<E> std::fmt::Debug for TokenLifecycleManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PkceChallenge;
    use url::Url;
    use std::collections::HashMap;

    fn query_of(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let manager = TokenLifecycleManager::new(OAuthConfig::default());
        let url = manager.begin_authorization();

        assert!(url.starts_with(
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"
        ));
        let query = query_of(&url);
        assert_eq!(query["client_id"], "28d3e5ae-00e3-4ff6-9443-742f353cf511");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "obsidian://mstodo-auth");
        assert_eq!(query["response_mode"], "query");
        assert_eq!(query["scope"], "Tasks.ReadWrite User.Read offline_access");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query.len(), 7);
        assert!(url.contains("&scope=Tasks.ReadWrite+User.Read+offline_access&"));
        assert!(url.contains("redirect_uri=obsidian%3A%2F%2Fmstodo-auth&"));

        // The challenge belongs to the verifier retained for this attempt
        let pending = lock(&manager.pending).clone().unwrap();
        assert_eq!(
            query["code_challenge"],
            PkceChallenge::derive_challenge(&pending.verifier)
        );
    }

    #[test]
    fn test_begin_overwrites_pending_verifier() {
        let manager = TokenLifecycleManager::new(OAuthConfig::default());

        let first_url = manager.begin_authorization();
        let first = lock(&manager.pending).clone().unwrap();
        let second_url = manager.begin_authorization();
        let second = lock(&manager.pending).clone().unwrap();

        assert_ne!(first.verifier, second.verifier);
        assert_ne!(
            query_of(&first_url)["code_challenge"],
            query_of(&second_url)["code_challenge"]
        );
    }

    #[test]
    fn test_abandon_and_clear_drop_pending() {
        let manager = TokenLifecycleManager::new(OAuthConfig::default());

        manager.begin_authorization();
        manager.abandon_authorization();
        assert!(!manager.has_pending_authorization());

        manager.begin_authorization();
        let mut tokens = TokenSet {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: now_secs() + 3600,
        };
        manager.clear(&mut tokens);
        assert!(tokens.is_empty());
        assert!(!manager.has_pending_authorization());
    }

    #[test]
    fn test_valid_access_token_accessors() {
        let current = ValidAccessToken::Current("at".to_string());
        assert_eq!(current.access_token(), "at");
        assert!(current.refreshed().is_none());
        assert_eq!(format!("{current:?}"), "Current(<redacted>)");

        let tokens = TokenSet {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_at: 1,
        };
        let refreshed = ValidAccessToken::Refreshed(tokens.clone());
        assert_eq!(refreshed.access_token(), "new");
        assert_eq!(refreshed.refreshed(), Some(&tokens));
    }
}
