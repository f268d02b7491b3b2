//! OAuth client configuration for the Microsoft identity platform

use typed_builder::TypedBuilder;

// Registered public client for the To Do integration
const DEFAULT_CLIENT_ID: &str = "28d3e5ae-00e3-4ff6-9443-742f353cf511";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_TENANT: &str = "common";
const DEFAULT_REDIRECT_URI: &str = "obsidian://mstodo-auth";
const DEFAULT_SCOPES: [&str; 3] = ["Tasks.ReadWrite", "User.Read", "offline_access"];

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(ToString::to_string).collect()
}

/// OAuth configuration
///
/// Every field has a default, so `OAuthConfig::default()` talks to the public
/// Microsoft endpoints. Tests and alternative tenants override single fields:
///
/// ```
/// use mstodo_auth::auth::OAuthConfig;
///
/// let config = OAuthConfig::builder().tenant("consumers").build();
/// assert_eq!(
///     config.token_url(),
///     "https://login.microsoftonline.com/consumers/oauth2/v2.0/token"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct OAuthConfig {
    /// OAuth client ID
    #[builder(default = DEFAULT_CLIENT_ID.to_string(), setter(into))]
    pub client_id: String,
    /// Identity provider base URL, without a trailing slash
    #[builder(default = DEFAULT_AUTHORITY.to_string(), setter(into))]
    pub authority: String,
    /// Tenant path segment (`common`, `consumers`, `organizations` or a tenant ID)
    #[builder(default = DEFAULT_TENANT.to_string(), setter(into))]
    pub tenant: String,
    /// Registered redirect URI the provider sends the code to
    #[builder(default = DEFAULT_REDIRECT_URI.to_string(), setter(into))]
    pub redirect_uri: String,
    /// Scopes to request
    #[builder(default = default_scopes())]
    pub scopes: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OAuthConfig {
    /// Default configuration with `MSTODO_*` environment overrides applied
    ///
    /// Recognised variables: `MSTODO_CLIENT_ID`, `MSTODO_AUTHORITY`,
    /// `MSTODO_TENANT` and `MSTODO_REDIRECT_URI`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("MSTODO_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = non_empty("MSTODO_AUTHORITY") {
            self.authority = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty("MSTODO_TENANT") {
            self.tenant = v;
        }
        if let Some(v) = non_empty("MSTODO_REDIRECT_URI") {
            self.redirect_uri = v;
        }
        self
    }

    /// Authorization endpoint (browser-delivered GET)
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/authorize", self.authority, self.tenant)
    }

    /// Token endpoint (form-encoded POST)
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant)
    }

    /// Space-joined scope list as sent on the wire
    #[must_use]
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_oauth_config_default() {
        let config = OAuthConfig::default();
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.redirect_uri, "obsidian://mstodo-auth");
        assert_eq!(config.scope(), "Tasks.ReadWrite User.Read offline_access");
        assert_eq!(
            config.authorize_url(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_builder_overrides_single_field() {
        let config = OAuthConfig::builder()
            .authority("http://127.0.0.1:9999")
            .build();
        assert_eq!(config.token_url(), "http://127.0.0.1:9999/common/oauth2/v2.0/token");
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MSTODO_CLIENT_ID", "my-client"),
            ("MSTODO_AUTHORITY", "https://login.example.com/"),
            ("MSTODO_TENANT", "  "),
        ]
        .into_iter()
        .collect();

        let config = OAuthConfig::default().with_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.client_id, "my-client");
        assert_eq!(config.authority, "https://login.example.com");
        // Blank values are ignored
        assert_eq!(config.tenant, DEFAULT_TENANT);
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
    }
}
