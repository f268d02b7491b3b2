//! # mstodo-auth
//!
//! Sign-in and token management for a Microsoft To Do client.
//!
//! The crate covers the OAuth 2.0 Authorization Code flow with PKCE against the
//! Microsoft identity platform and the access/refresh token lifecycle behind
//! every Graph API call. Task CRUD, UI and the redirect transport belong to the
//! host; they consume the bearer token produced here.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mstodo_auth::{AuthCallback, OAuthConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::open(OAuthConfig::from_env()).await?;
//!
//!     if !session.is_signed_in().await {
//!         println!("Open: {}", session.begin_authorization());
//!         // The host hands over the redirect it received
//!         let redirect = "obsidian://mstodo-auth?code=...";
//!         session
//!             .complete_authorization(AuthCallback::from_redirect_url(redirect)?)
//!             .await?;
//!     }
//!
//!     // Refreshes (and persists) automatically near expiry
//!     let header = session.authorization_header().await?;
//!     println!("{header}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`auth`]: PKCE, configuration, token endpoint transport, the
//!   [`TokenLifecycleManager`], token types and stores
//! - [`session`]: [`Session`], which pairs the manager with a [`TokenStore`]
//! - [`error`]: [`AuthError`] and [`SessionError`]
//!
//! ## Concurrency
//!
//! Concurrent callers that find the same token near expiry share one refresh
//! request. Nothing is retried internally; retry policy belongs to the caller.
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! Tokens and verifiers are never logged. To see logs, attach a subscriber:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! # use mstodo_auth::{Session, SessionError, AuthError};
//! # async fn example(session: &Session) {
//! match session.access_token().await {
//!     Ok(token) => { /* call the API */ }
//!     Err(SessionError::Auth(e)) if e.requires_sign_in() => {
//!         eprintln!("Session expired, please sign in again");
//!     }
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use auth::{
    AuthCallback, FileTokenStore, MemoryTokenStore, OAuthConfig, TokenLifecycleManager, TokenSet,
    TokenStore, ValidAccessToken,
};
pub use error::{AuthError, Result, SessionError};
pub use session::Session;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
