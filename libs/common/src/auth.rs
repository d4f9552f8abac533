//! OAuth2 credentials for the Google Photos Library API
//!
//! The feeder runs unattended, so it only supports the refresh-token grant:
//! an access token is exchanged on demand and cached until shortly before it
//! expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use oauth2::{
    AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl, basic::BasicClient,
    reqwest::async_http_client,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{PhotosError, PhotosResult};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Renew this long before the provider-reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Access tokens without an expiry are reused for this long
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// OAuth2 configuration for the refresh-token grant
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration against Google's OAuth2 endpoints
    pub fn google(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

struct CachedToken {
    secret: String,
    expires_at: Instant,
}

enum CredentialsInner {
    Static(String),
    Refreshing {
        client: BasicClient,
        refresh_token: RefreshToken,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Source of bearer tokens for API calls
#[derive(Clone)]
pub struct Credentials {
    inner: Arc<CredentialsInner>,
}

impl Credentials {
    /// Use a fixed access token, never renewed
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CredentialsInner::Static(token.into())),
        }
    }

    /// Exchange the refresh token whenever the cached access token is stale
    pub fn refreshing(config: OAuthConfig) -> PhotosResult<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id),
            Some(ClientSecret::new(config.client_secret)),
            AuthUrl::new(config.auth_url)
                .map_err(|e| PhotosError::Auth(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(config.token_url)
                    .map_err(|e| PhotosError::Auth(format!("Invalid token URL: {}", e)))?,
            ),
        );

        Ok(Self {
            inner: Arc::new(CredentialsInner::Refreshing {
                client,
                refresh_token: RefreshToken::new(config.refresh_token),
                cached: Mutex::new(None),
            }),
        })
    }

    /// Get a valid access token
    pub async fn access_token(&self) -> PhotosResult<String> {
        match self.inner.as_ref() {
            CredentialsInner::Static(token) => Ok(token.clone()),
            CredentialsInner::Refreshing {
                client,
                refresh_token,
                cached,
            } => {
                let mut cached = cached.lock().await;

                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.expires_at {
                        return Ok(token.secret.clone());
                    }
                }

                info!("Refreshing Google Photos access token");
                let response = client
                    .exchange_refresh_token(refresh_token)
                    .request_async(async_http_client)
                    .await
                    .map_err(|e| PhotosError::Auth(e.to_string()))?;

                let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
                let secret = response.access_token().secret().clone();
                *cached = Some(CachedToken {
                    secret: secret.clone(),
                    expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
                });

                Ok(secret)
            }
        }
    }

    /// Forget a cached access token, e.g. after the API rejected it
    pub async fn invalidate(&self) {
        if let CredentialsInner::Refreshing { cached, .. } = self.inner.as_ref() {
            cached.lock().await.take();
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner.as_ref() {
            CredentialsInner::Static(_) => "static",
            CredentialsInner::Refreshing { .. } => "refreshing",
        };
        f.debug_struct("Credentials").field("kind", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let credentials = Credentials::from_access_token("ya29.static");
        assert_eq!(
            credentials.access_token().await.expect("static token"),
            "ya29.static"
        );
    }

    #[test]
    fn test_invalid_token_url_is_rejected() {
        let mut config = OAuthConfig::google(
            "client".to_string(),
            "secret".to_string(),
            "refresh".to_string(),
        );
        config.token_url = "not a url".to_string();

        assert!(matches!(
            Credentials::refreshing(config),
            Err(PhotosError::Auth(_))
        ));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let credentials = Credentials::from_access_token("ya29.secret");
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("ya29.secret"));
    }
}
