//! Device Authorization Grant (RFC 8628).

use super::OAuthClient;
use crate::error::{Error, Result};
use crate::token::{ErrorResponse, Token};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra delay the server asks for on `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Device authorization response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceAuthorization {
    /// Device code for polling.
    pub device_code: String,
    /// User code to display to the user.
    pub user_code: String,
    /// Verification URI where user should go.
    pub verification_uri: String,
    /// Ready-made instructions (Microsoft sends these).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Expiration time in seconds.
    pub expires_in: u32,
    /// Polling interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u32,
}

const fn default_interval() -> u32 {
    5
}

/// Device flow for terminals without an embedded browser.
#[derive(Debug)]
pub struct DeviceFlow {
    client: OAuthClient,
}

impl DeviceFlow {
    /// Creates a new device flow.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    /// Requests a device code and user code for the provider's scopes.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization request fails.
    pub async fn request_device_authorization(&self) -> Result<DeviceAuthorization> {
        let scope = self.client.provider.scope_param();
        let params = [
            ("client_id", self.client.client_id.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .client
            .http_client
            .post(self.client.provider.device_auth_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        response.json().await.map_err(Into::into)
    }

    /// Waits `interval`, then polls the token endpoint once.
    ///
    /// # Errors
    ///
    /// Pending states come back as [`Error::OAuth`] with
    /// `authorization_pending` or `slow_down` (see [`Error::is_pending`]).
    /// Denial and expiry map to [`Error::AccessDenied`] and
    /// [`Error::DeviceCodeExpired`].
    pub async fn poll_for_token(&self, device_code: &str, interval: Duration) -> Result<Token> {
        tokio::time::sleep(interval).await;

        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("device_code", device_code),
            ("client_id", self.client.client_id.as_str()),
        ];

        self.client
            .request_token(&self.client.provider.token_url, &params)
            .await
            .map_err(classify_poll_error)
    }

    /// Polls until the user completes sign-in, honouring `slow_down`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] after `max_attempts` pending polls, or the
    /// first non-pending error.
    pub async fn wait_for_token(
        &self,
        auth: &DeviceAuthorization,
        max_attempts: usize,
    ) -> Result<Token> {
        let mut interval = Duration::from_secs(u64::from(auth.interval.max(1)));

        for attempt in 1..=max_attempts {
            match self.poll_for_token(&auth.device_code, interval).await {
                Ok(token) => {
                    info!(attempt, "device authorization completed");
                    return Ok(token);
                }
                Err(Error::OAuth { ref error, .. }) if error == "slow_down" => {
                    interval += SLOW_DOWN_STEP;
                    debug!(?interval, "provider asked to slow down");
                }
                Err(e) if e.is_pending() => debug!(attempt, "authorization pending"),
                Err(e) => return Err(e),
            }
        }

        Err(Error::Timeout(u64::from(auth.expires_in)))
    }
}

/// Maps device-flow error codes onto dedicated variants.
fn classify_poll_error(err: Error) -> Error {
    match err {
        Error::OAuth { ref error, .. } if error == "access_denied" => Error::AccessDenied,
        Error::OAuth { ref error, .. } if error == "expired_token" => Error::DeviceCodeExpired,
        other => other,
    }
}
