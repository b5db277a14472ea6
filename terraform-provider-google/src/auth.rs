//! Google Cloud authentication
//!
//! Credentials resolve in order: a static OAuth access token, an explicit
//! service account key (file path or JSON content), then Application Default
//! Credentials. Tokens minted through `gcp_auth` are cached until shortly
//! before they expire.

use crate::config::GoogleProviderConfig;
use anyhow::{Context, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Scopes requested for API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Refresh tokens this long before they expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Assumed lifetime of a minted token
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
enum TokenSource {
    Static(String),
    Provider(Arc<dyn TokenProvider>),
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct GoogleCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GoogleCredentials {
    /// Resolve credentials from provider settings.
    pub async fn from_config(settings: &GoogleProviderConfig) -> Result<Self> {
        if let Some(token) = settings.access_token.as_deref().filter(|t| !t.is_empty()) {
            tracing::debug!("Authenticating with a static access token");
            return Ok(Self::from_access_token(token));
        }

        if let Some(credentials) = settings.credentials.as_deref().filter(|c| !c.is_empty()) {
            let account = service_account(credentials)?;
            tracing::debug!("Authenticating with service account credentials");
            return Ok(Self::from_provider(Arc::new(account)));
        }

        let provider = gcp_auth::provider().await.context(
            "Failed to find Application Default Credentials. Set credentials, access_token, or run 'gcloud auth application-default login'",
        )?;
        tracing::debug!("Authenticating with Application Default Credentials");
        Ok(Self::from_provider(provider))
    }

    pub fn from_access_token(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    fn from_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(provider),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;
        let token = token.as_str().to_string();

        let mut cache = self.token_cache.write().await;
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER,
        });

        Ok(token)
    }
}

/// Service account key from inline JSON or a file path.
fn service_account(credentials: &str) -> Result<CustomServiceAccount> {
    if credentials.trim_start().starts_with('{') {
        return CustomServiceAccount::from_json(credentials)
            .context("Failed to parse credentials JSON");
    }

    let path = expand_home(credentials);
    CustomServiceAccount::from_file(&path)
        .with_context(|| format!("Failed to load credentials from {}", path))
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}
