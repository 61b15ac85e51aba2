//! `OAuth2` client and grant flows.

mod device;

pub use device::{DeviceAuthorization, DeviceFlow};

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Public-client `OAuth2` configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Application (client) id registered with the provider.
    pub client_id: String,
    /// Provider configuration.
    pub provider: Provider,
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            provider,
            http_client: Client::new(),
        }
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The previous refresh token is kept when the provider does not rotate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token has no refresh token or the exchange fails.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;
        let scope = self.provider.scope_param();

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("scope", scope.as_str()),
        ];

        debug!(provider = %self.provider.name, "refreshing access token");
        let mut new_token = self.request_token(&self.provider.token_url, &params).await?;

        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }

        Ok(new_token)
    }

    /// POSTs a form to a token endpoint and decodes the token or error body.
    pub(crate) async fn request_token(&self, url: &Url, params: &[(&str, &str)]) -> Result<Token> {
        let response = self
            .http_client
            .post(url.clone())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(Token::from_response(token_response))
    }
}
