//! Signed-in session: lifecycle manager plus persisted credentials
//!
//! [`Session`] is the injectable state holder a host keeps for the signed-in
//! identity. Refreshed tokens are written to the [`TokenStore`] before the
//! access token is returned, so a rotated refresh token is never lost to a
//! crash between the refresh and the API call that uses it.

use crate::auth::{
    AuthCallback, FileTokenStore, HttpTokenEndpoint, OAuthConfig, TokenEndpoint,
    TokenLifecycleManager, TokenSet, TokenStore, ValidAccessToken, bearer_header,
};
use crate::error::{AuthError, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Current credentials for one identity, backed by a [`TokenStore`]
pub struct Session<E = HttpTokenEndpoint, S = FileTokenStore> {
    manager: TokenLifecycleManager<E>,
    store: S,
    tokens: RwLock<TokenSet>,
}

impl Session<HttpTokenEndpoint, FileTokenStore> {
    /// Open a session with HTTP transport and the default token file
    ///
    /// # Errors
    ///
    /// Returns an error if an existing token file cannot be read.
    pub async fn open(config: OAuthConfig) -> Result<Self> {
        Self::load(TokenLifecycleManager::new(config), FileTokenStore::new()).await
    }
}

impl<E: TokenEndpoint + 'static, S: TokenStore> Session<E, S> {
    /// Restore persisted credentials, or start signed out
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to load.
    pub async fn load(manager: TokenLifecycleManager<E>, store: S) -> Result<Self> {
        let tokens = store.load().await?.unwrap_or_default();
        if tokens.is_empty() {
            debug!("No stored credentials");
        } else {
            debug!("Restored stored credentials");
        }

        Ok(Self {
            manager,
            store,
            tokens: RwLock::new(tokens),
        })
    }

    /// Get the lifecycle manager
    #[must_use]
    pub fn manager(&self) -> &TokenLifecycleManager<E> {
        &self.manager
    }

    /// Get the token store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the current credentials
    pub async fn tokens(&self) -> TokenSet {
        self.tokens.read().await.clone()
    }

    /// Whether credentials exist that can produce an access token
    pub async fn is_signed_in(&self) -> bool {
        let tokens = self.tokens.read().await;
        tokens.refresh_token().is_some() || !tokens.needs_refresh()
    }

    /// Start sign-in; see [`TokenLifecycleManager::begin_authorization`]
    pub fn begin_authorization(&self) -> String {
        self.manager.begin_authorization()
    }

    /// Redeem the redirect callback, then persist and install the tokens
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] variants from the exchange, or a storage error if
    /// the new tokens cannot be saved (they are still installed in memory).
    pub async fn complete_authorization(&self, callback: AuthCallback) -> Result<()> {
        let tokens = self.manager.handle_callback(callback).await?;

        let mut current = self.tokens.write().await;
        let saved = self.store.save(&tokens).await;
        *current = tokens;
        saved?;

        info!("Signed in");
        Ok(())
    }

    /// Return a usable access token, refreshing and persisting if needed
    ///
    /// # Errors
    ///
    /// [`AuthError::NoCredentials`] or [`AuthError::RefreshFailed`] when the
    /// user has to sign in again; the stored credentials are left untouched.
    /// A storage error if a refreshed token set could not be saved.
    pub async fn access_token(&self) -> Result<String> {
        let snapshot = self.tokens.read().await.clone();

        let fresh = match self.manager.get_valid_access_token(&snapshot).await? {
            ValidAccessToken::Current(token) => return Ok(token),
            ValidAccessToken::Refreshed(fresh) => fresh,
        };

        let mut current = self.tokens.write().await;
        if *current == fresh {
            // A concurrent caller sharing this refresh already saved it
            return Ok(fresh.access_token);
        }
        if current.refresh_token != snapshot.refresh_token {
            // Signed out or replaced by a new sign-in while refreshing; the
            // refreshed set is never saved, so it must not be handed out
            debug!("Discarding refresh that finished after the credentials changed");
            if current.is_empty() || current.needs_refresh() {
                return Err(AuthError::NoCredentials.into());
            }
            return Ok(current.access_token.clone());
        }

        let saved = self.store.save(&fresh).await;
        *current = fresh;
        saved?;
        Ok(current.access_token.clone())
    }

    /// `Authorization` header value for the next API call
    ///
    /// # Errors
    ///
    /// As [`access_token`](Self::access_token).
    pub async fn authorization_header(&self) -> Result<String> {
        Ok(bearer_header(&self.access_token().await?))
    }

    /// Forget all credentials, in memory and in the store
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared; memory is cleared
    /// regardless.
    pub async fn sign_out(&self) -> Result<()> {
        let mut current = self.tokens.write().await;
        self.manager.clear(&mut current);
        self.store.clear().await?;
        info!("Signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, now_secs};

    fn manager() -> TokenLifecycleManager {
        TokenLifecycleManager::new(OAuthConfig::builder().authority("http://127.0.0.1:9").build())
    }

    #[tokio::test]
    async fn test_load_signed_out() {
        let session = Session::load(manager(), MemoryTokenStore::new()).await.unwrap();
        assert!(!session.is_signed_in().await);
        assert!(session.tokens().await.is_empty());

        let err = session.access_token().await.unwrap_err();
        assert!(matches!(err, crate::SessionError::Auth(AuthError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_valid_token_served_without_network() {
        let stored = TokenSet {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: now_secs() + 3600,
        };
        let session = Session::load(manager(), MemoryTokenStore::with_tokens(stored))
            .await
            .unwrap();

        assert!(session.is_signed_in().await);
        assert_eq!(session.authorization_header().await.unwrap(), "Bearer at");
    }

    #[tokio::test]
    async fn test_sign_out_clears_memory_and_store() {
        let stored = TokenSet {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: now_secs() + 3600,
        };
        let session = Session::load(manager(), MemoryTokenStore::with_tokens(stored))
            .await
            .unwrap();

        session.sign_out().await.unwrap();

        assert!(session.tokens().await.is_empty());
        assert_eq!(session.store().load().await.unwrap(), None);
        assert!(!session.is_signed_in().await);
    }
}
