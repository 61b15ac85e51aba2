//! Access-token acquisition.
//!
//! The provider is resolved once at startup from configuration and asked for
//! a bearer credential before the session connects.

use std::future::Future;

use mailsweep_imap::BearerCredential;
use mailsweep_oauth::{DeviceAuthorization, DeviceFlow, OAuthClient, Provider, Token};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::token_cache::TokenCache;

pub use mailsweep_oauth::provider::DEFAULT_TENANT;

/// Supplies a bearer credential for an account.
pub trait TokenProvider {
    /// Returns a credential for `identity`, possibly after user interaction.
    fn acquire_token(&self, identity: &str) -> impl Future<Output = Result<BearerCredential>>;
}

/// Hands out a token supplied verbatim in configuration.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wraps a literal access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TokenProvider for StaticTokenProvider {
    async fn acquire_token(&self, identity: &str) -> Result<BearerCredential> {
        debug!(identity, "using configured access token");
        Ok(BearerCredential::new(identity, self.token.clone()))
    }
}

/// Always fails, naming the setting that is missing.
#[derive(Debug, Clone)]
pub struct UnconfiguredTokenProvider {
    setting: String,
}

impl UnconfiguredTokenProvider {
    /// Creates a provider that reports `setting` as unset.
    #[must_use]
    pub fn new(setting: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
        }
    }
}

impl TokenProvider for UnconfiguredTokenProvider {
    async fn acquire_token(&self, _identity: &str) -> Result<BearerCredential> {
        Err(Error::Auth(format!(
            "no token provider configured: set '{}'",
            self.setting
        )))
    }
}

/// Microsoft identity platform via the device authorization grant.
#[derive(Debug, Clone)]
pub struct OAuthTokenProvider {
    client: OAuthClient,
    cache: Option<TokenCache>,
    force_interactive: bool,
}

impl OAuthTokenProvider {
    /// Creates a provider for an app registration in `tenant`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant is invalid.
    pub fn new(client_id: impl Into<String>, tenant: &str) -> Result<Self> {
        let provider = Provider::microsoft(tenant)?;
        Ok(Self {
            client: OAuthClient::new(client_id, provider),
            cache: None,
            force_interactive: false,
        })
    }

    /// Reuses and persists tokens through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Skips the cache and always signs in interactively.
    #[must_use]
    pub const fn force_interactive(mut self, force: bool) -> Self {
        self.force_interactive = force;
        self
    }

    /// A still-valid token from the cache, refreshed if needed.
    async fn cached_token(&self, identity: &str) -> Option<Token> {
        let cache = self.cache.as_ref()?;
        let token = match cache.load(identity) {
            Ok(token) => token?,
            Err(e) => {
                warn!(error = %e, "token cache unreadable");
                return None;
            }
        };

        if !token.is_expired() {
            debug!(identity, "using cached token");
            return Some(token);
        }
        if !token.can_refresh() {
            return None;
        }

        match self.client.refresh_token(&token).await {
            Ok(fresh) => {
                info!(identity, "access token refreshed");
                self.remember(identity, &fresh);
                Some(fresh)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, signing in again");
                None
            }
        }
    }

    async fn sign_in(&self, identity: &str) -> Result<Token> {
        let flow = DeviceFlow::new(self.client.clone());
        let auth = flow.request_device_authorization().await?;

        eprintln!("{}", sign_in_prompt(&auth));
        if let Err(e) = opener::open(&auth.verification_uri) {
            debug!(error = %e, "could not open browser");
        }

        let token = flow.wait_for_token(&auth, max_polls(&auth)).await?;
        info!(identity, "signed in");
        self.remember(identity, &token);
        Ok(token)
    }

    fn remember(&self, identity: &str, token: &Token) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.store(identity, token)
        {
            warn!(error = %e, "could not cache token");
        }
    }
}

impl TokenProvider for OAuthTokenProvider {
    async fn acquire_token(&self, identity: &str) -> Result<BearerCredential> {
        let cached = if self.force_interactive {
            None
        } else {
            self.cached_token(identity).await
        };

        let token = match cached {
            Some(token) => token,
            None => self.sign_in(identity).await?,
        };
        Ok(BearerCredential::new(identity, token.access_token))
    }
}

fn sign_in_prompt(auth: &DeviceAuthorization) -> String {
    auth.message.clone().unwrap_or_else(|| {
        format!(
            "To sign in, open {} and enter the code {}",
            auth.verification_uri, auth.user_code
        )
    })
}

/// Polls that fit in the device code's lifetime.
fn max_polls(auth: &DeviceAuthorization) -> usize {
    let polls = auth.expires_in / auth.interval.max(1);
    usize::try_from(polls).unwrap_or(usize::MAX).max(1)
}

/// Token-related settings, already stripped of placeholders.
#[derive(Debug, Clone, Default)]
pub struct TokenSettings {
    /// Application (client) id.
    pub client_id: Option<String>,
    /// Directory tenant; `consumers` when unset.
    pub tenant: Option<String>,
    /// Literal access token that bypasses sign-in.
    pub access_token: Option<String>,
    /// Ignore cached tokens.
    pub force_interactive: bool,
}

/// The provider chosen for this run.
#[derive(Debug, Clone)]
pub enum ConfiguredProvider {
    /// Literal token from configuration.
    Static(StaticTokenProvider),
    /// Device-flow sign-in with caching.
    OAuth(OAuthTokenProvider),
    /// Nothing usable configured.
    Unconfigured(UnconfiguredTokenProvider),
}

impl ConfiguredProvider {
    /// Picks a provider: literal token, then client id, else the stub.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant is invalid.
    pub fn resolve(settings: &TokenSettings, cache: Option<TokenCache>) -> Result<Self> {
        if let Some(token) = &settings.access_token {
            return Ok(Self::Static(StaticTokenProvider::new(token.clone())));
        }

        let Some(client_id) = &settings.client_id else {
            return Ok(Self::Unconfigured(UnconfiguredTokenProvider::new(
                "oauth2.client_id",
            )));
        };

        let tenant = settings.tenant.as_deref().unwrap_or(DEFAULT_TENANT);
        let mut provider = OAuthTokenProvider::new(client_id.clone(), tenant)?
            .force_interactive(settings.force_interactive);
        if let Some(cache) = cache {
            provider = provider.with_cache(cache);
        }
        Ok(Self::OAuth(provider))
    }
}

impl TokenProvider for ConfiguredProvider {
    async fn acquire_token(&self, identity: &str) -> Result<BearerCredential> {
        match self {
            Self::Static(p) => p.acquire_token(identity).await,
            Self::OAuth(p) => p.acquire_token(identity).await,
            Self::Unconfigured(p) => p.acquire_token(identity).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn settings(client_id: Option<&str>, access_token: Option<&str>) -> TokenSettings {
        TokenSettings {
            client_id: client_id.map(String::from),
            access_token: access_token.map(String::from),
            ..TokenSettings::default()
        }
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = ConfiguredProvider::resolve(&settings(Some("id"), Some("tok")), None).unwrap();
        assert!(matches!(provider, ConfiguredProvider::Static(_)));

        let credential = provider.acquire_token("user@example.com").await.unwrap();
        assert_eq!(credential.identity(), "user@example.com");
        assert_eq!(credential.token(), "tok");
    }

    #[tokio::test]
    async fn test_unconfigured_names_setting() {
        let provider = ConfiguredProvider::resolve(&settings(None, None), None).unwrap();
        let err = provider.acquire_token("user@example.com").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.to_string().contains("oauth2.client_id"));
    }

    #[test]
    fn test_invalid_tenant_rejected() {
        let mut s = settings(Some("id"), None);
        s.tenant = Some("a/b".to_string());
        assert!(matches!(
            ConfiguredProvider::resolve(&s, None),
            Err(Error::OAuth(_))
        ));
    }

    #[tokio::test]
    async fn test_valid_cached_token_is_reused() {
        let dir = TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path().join("tokens.json"));
        let token = Token::bearer("cached").with_expires_at(Utc::now() + Duration::hours(1));
        cache.store("user@example.com", &token).unwrap();

        let provider = OAuthTokenProvider::new("id", DEFAULT_TENANT)
            .unwrap()
            .with_cache(cache);
        let credential = provider.acquire_token("USER@example.com").await.unwrap();
        assert_eq!(credential.token(), "cached");
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path().join("tokens.json"));
        let token = Token::bearer("old").with_expires_at(Utc::now() - Duration::hours(1));
        cache.store("user@example.com", &token).unwrap();

        let provider = OAuthTokenProvider::new("id", DEFAULT_TENANT)
            .unwrap()
            .with_cache(cache);
        assert!(provider.cached_token("user@example.com").await.is_none());
    }

    #[test]
    fn test_prompt_and_poll_budget() {
        let auth = DeviceAuthorization {
            device_code: "d".into(),
            user_code: "ABC123".into(),
            verification_uri: "https://microsoft.com/link".into(),
            message: None,
            expires_in: 900,
            interval: 5,
        };
        assert_eq!(max_polls(&auth), 180);
        let prompt = sign_in_prompt(&auth);
        assert!(prompt.contains("ABC123"));
        assert!(prompt.contains("https://microsoft.com/link"));
    }
}
