//! Provider configuration
//!
//! The provider block deserializes into [`GoogleProviderConfig`]; unset
//! arguments fall back to the usual Google Cloud environment variables.

use provider_common::{ProviderError, ProviderResult, ResourceState};
use serde::Deserialize;

pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1/";

const CREDENTIALS_ENV: &[&str] = &[
    "GOOGLE_CREDENTIALS",
    "GOOGLE_CLOUD_KEYFILE_JSON",
    "GCLOUD_KEYFILE_JSON",
];

const PROJECT_ENV: &[&str] = &[
    "GOOGLE_PROJECT",
    "GOOGLE_CLOUD_PROJECT",
    "GCLOUD_PROJECT",
    "CLOUDSDK_CORE_PROJECT",
];

/// Settings of the `provider "google"` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleProviderConfig {
    /// Service account key: a file path or the JSON document itself
    pub credentials: Option<String>,
    pub access_token: Option<String>,
    pub project: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub compute_custom_endpoint: Option<String>,
}

impl GoogleProviderConfig {
    pub fn from_state(config: &ResourceState) -> ProviderResult<Self> {
        serde_json::from_value(config.to_value())
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
    }

    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks(|key| std::env::var(key).ok())
    }

    /// Fill unset settings from `lookup`, keyed by environment variable name.
    /// The first non-empty variable of each list wins.
    pub fn with_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()))
        };

        self.credentials = self.credentials.or_else(|| first(CREDENTIALS_ENV));
        self.access_token = self
            .access_token
            .or_else(|| first(&["GOOGLE_OAUTH_ACCESS_TOKEN"]));
        self.project = self.project.or_else(|| first(PROJECT_ENV));
        self.region = self.region.or_else(|| first(&["GOOGLE_REGION"]));
        self.zone = self.zone.or_else(|| first(&["GOOGLE_ZONE"]));
        self.compute_custom_endpoint = self
            .compute_custom_endpoint
            .or_else(|| first(&["GOOGLE_COMPUTE_CUSTOM_ENDPOINT"]));
        self
    }

    /// Compute API base URL, always ending in `/`
    pub fn compute_endpoint(&self) -> String {
        let endpoint = self
            .compute_custom_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_COMPUTE_ENDPOINT);

        if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        }
    }
}
