//! Identity provider endpoints.

use crate::error::{Error, Result};
use url::Url;

/// Scope granting IMAP access to an Outlook mailbox.
pub const OUTLOOK_IMAP_SCOPE: &str = "https://outlook.office.com/IMAP.AccessAsUser.All";

/// Scope that makes the provider issue a refresh token.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// Tenant for personal Microsoft accounts.
pub const DEFAULT_TENANT: &str = "consumers";

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name, used in diagnostics.
    pub name: String,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Device authorization endpoint.
    pub device_auth_url: Url,
    /// Scopes requested by default.
    pub scopes: Vec<String>,
}

impl Provider {
    /// Microsoft identity platform (v2.0 endpoints) for a tenant.
    ///
    /// `tenant` is `consumers` for personal accounts, `organizations`,
    /// `common`, or a directory id. Requests the IMAP scope plus
    /// `offline_access`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant is blank or yields an invalid URL.
    pub fn microsoft(tenant: &str) -> Result<Self> {
        let tenant = tenant.trim();
        if tenant.is_empty() || tenant.contains('/') {
            return Err(Error::InvalidConfig(format!("invalid tenant {tenant:?}")));
        }

        let base = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0");
        Ok(Self {
            name: "Microsoft".to_string(),
            token_url: Url::parse(&format!("{base}/token"))?,
            device_auth_url: Url::parse(&format!("{base}/devicecode"))?,
            scopes: vec![
                OUTLOOK_IMAP_SCOPE.to_string(),
                OFFLINE_ACCESS_SCOPE.to_string(),
            ],
        })
    }

    /// Space-separated scope string for form requests.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_microsoft_consumers() {
        let provider = Provider::microsoft(DEFAULT_TENANT).unwrap();
        assert_eq!(
            provider.token_url.as_str(),
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/token"
        );
        assert_eq!(
            provider.device_auth_url.as_str(),
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/devicecode"
        );
        assert_eq!(
            provider.scope_param(),
            "https://outlook.office.com/IMAP.AccessAsUser.All offline_access"
        );
    }

    #[test]
    fn test_microsoft_tenant_id() {
        let provider = Provider::microsoft("8f2b1c3a-0000-4000-8000-000000000000").unwrap();
        assert!(provider.token_url.path().starts_with("/8f2b1c3a-"));
    }

    #[test]
    fn test_invalid_tenant() {
        assert!(matches!(Provider::microsoft("  "), Err(Error::InvalidConfig(_))));
        assert!(matches!(Provider::microsoft("a/b"), Err(Error::InvalidConfig(_))));
    }
}
