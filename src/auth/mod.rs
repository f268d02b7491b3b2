//! OAuth authentication module for Microsoft To Do
//!
//! Provides OAuth 2.0 sign-in against the Microsoft identity platform using
//! PKCE (Proof Key for Code Exchange), plus the access/refresh token lifecycle.
//!
//! # Overview
//!
//! The flow works as follows:
//!
//! 1. [`TokenLifecycleManager::begin_authorization`] generates a verifier,
//!    keeps it, and returns the authorization URL carrying its challenge
//! 2. The host opens the URL; the provider redirects back with a code
//! 3. [`TokenLifecycleManager::complete_authorization`] exchanges code +
//!    verifier for a [`TokenSet`]
//! 4. Before each API call, [`TokenLifecycleManager::get_valid_access_token`]
//!    returns the cached token or refreshes it when it is within
//!    [`REFRESH_MARGIN`] of expiry
//!
//! # Example
//!
//! ```no_run
//! use mstodo_auth::auth::{AuthCallback, OAuthConfig, TokenLifecycleManager};
//!
//! # async fn example(redirect: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = TokenLifecycleManager::new(OAuthConfig::default());
//!
//! let url = manager.begin_authorization();
//! println!("Open {url}");
//!
//! // ... later, from the redirect handler
//! let callback = AuthCallback::from_redirect_url(redirect)?;
//! let tokens = manager.handle_callback(callback).await?;
//!
//! let token = manager.get_valid_access_token(&tokens).await?;
//! println!("Authorization: Bearer {}", token.access_token());
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Verifiers come from the thread-local CSPRNG and never leave memory
//! - `Debug` output redacts verifiers and tokens
//! - [`FileTokenStore`] writes with user-only permissions (600)

mod callback;
mod config;
mod endpoint;
mod manager;
mod pkce;
mod store;
mod token;

pub use callback::{AuthCallback, CallbackError};
pub use config::OAuthConfig;
pub use endpoint::{EndpointError, HttpTokenEndpoint, TokenEndpoint};
pub use manager::{TokenLifecycleManager, ValidAccessToken};
pub use pkce::{CHALLENGE_METHOD, PkceChallenge, PkceParameters};
pub use store::{FileTokenStore, MemoryTokenStore, TokenError, TokenStore};
pub use token::{REFRESH_MARGIN, TokenResponse, TokenSet, bearer_header, now_secs};
