use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use gcloud_storage_core::Credentials;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum TokenSource {
    Anonymous,
    Static(String),
    MetadataServer { url: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct AuthProvider {
    source: TokenSource,
    http: reqwest::Client,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl AuthProvider {
    fn with_source(source: TokenSource) -> Self {
        Self {
            source,
            http: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// No `Authorization` header at all, for public buckets.
    pub fn anonymous() -> Self {
        Self::with_source(TokenSource::Anonymous)
    }

    pub fn static_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Static(token.into()))
    }

    pub fn metadata_server() -> Self {
        Self::metadata_server_at(METADATA_TOKEN_URL)
    }

    pub fn metadata_server_at(url: impl Into<String>) -> Self {
        Self::with_source(TokenSource::MetadataServer { url: url.into() })
    }

    /// Missing credentials fall back to the metadata server.
    pub fn from_credentials(credentials: Option<&Credentials>) -> Result<Self> {
        match credentials {
            None | Some(Credentials::MetadataServer) => Ok(Self::metadata_server()),
            Some(Credentials::AccessToken { token }) => Ok(Self::static_token(token.clone())),
            Some(Credentials::Hmac { .. }) => {
                anyhow::bail!("HMAC credentials only work with the S3 interoperability client")
            }
        }
    }

    pub async fn get_token(&self) -> Result<Option<String>> {
        let url = match &self.source {
            TokenSource::Anonymous => return Ok(None),
            TokenSource::Static(token) => return Ok(Some(token.clone())),
            TokenSource::MetadataServer { url } => url,
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.expires_at > Instant::now() + EXPIRY_MARGIN
            {
                return Ok(Some(cached.access_token.clone()));
            }
        }

        let resp = self
            .http
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("metadata server token request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("metadata server token request failed ({status}): {body}");
        }

        let token_resp: TokenResponse = resp
            .json()
            .await
            .context("failed to parse metadata server token")?;
        debug!(expires_in = token_resp.expires_in, "fetched access token");

        let cached = CachedToken {
            access_token: token_resp.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token_resp.expires_in),
        };
        *self.cache.write().await = Some(cached);

        Ok(Some(token_resp.access_token))
    }
}
