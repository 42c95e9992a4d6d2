//! Provider client: exchanges a provider access token for raw user claims.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::ProviderError;
use crate::models::oauth::OAuthProvider;

/// Google OpenID userinfo endpoint.
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Facebook Graph API `/me` endpoint.
pub const FACEBOOK_ME_URL: &str = "https://graph.facebook.com/me";

/// Fields requested from the Graph API.
const FACEBOOK_FIELDS: &str = "id,email,first_name,last_name,picture";

/// Default outbound request timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw provider answer. `claims` is only meaningful when `status == 200`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub status: u16,
    pub claims: Value,
}

/// Fetches raw claims from an identity provider.
///
/// Implementations own timeouts and retries. Dropping the returned future
/// cancels the call.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn fetch_claims(
        &self,
        provider: OAuthProvider,
        token: &str,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Endpoint and timeout settings for [`HttpProviderClient`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub google_userinfo_url: String,
    pub facebook_me_url: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            google_userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            facebook_me_url: FACEBOOK_ME_URL.to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// reqwest-backed provider client.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    client: Client,
    config: ProviderConfig,
}

impl HttpProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("client build: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn fetch_claims(
        &self,
        provider: OAuthProvider,
        token: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = match provider {
            OAuthProvider::Google => self
                .client
                .get(&self.config.google_userinfo_url)
                .bearer_auth(token),
            OAuthProvider::Facebook => self
                .client
                .get(&self.config.facebook_me_url)
                .query(&[("fields", FACEBOOK_FIELDS), ("access_token", token)]),
        };

        let resp = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{provider} userinfo: {e}")))?;

        let status = resp.status().as_u16();
        debug!(%provider, status, "provider userinfo response");

        if status != 200 {
            return Ok(ProviderResponse {
                status,
                claims: Value::Null,
            });
        }

        let claims = resp
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Decode(format!("{provider} userinfo: {e}")))?;

        Ok(ProviderResponse { status, claims })
    }
}
