//! Google client
//!
//! Combines authentication and HTTP with the provider default project.

use crate::auth::GoogleCredentials;
use crate::compute::OperationWait;
use crate::config::GoogleProviderConfig;
use crate::error::{GoogleError, GoogleResult};
use crate::http::GoogleHttpClient;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Configured client handed to every resource
#[derive(Clone)]
pub struct GoogleClient {
    credentials: GoogleCredentials,
    http: GoogleHttpClient,
    compute_endpoint: String,
    project: Option<String>,
    operation_wait: OperationWait,
}

impl GoogleClient {
    pub async fn new(settings: &GoogleProviderConfig) -> Result<Self> {
        let credentials = GoogleCredentials::from_config(settings)
            .await
            .context("Failed to initialize Google credentials")?;
        let http = GoogleHttpClient::new().context("Failed to create HTTP client")?;

        let client = Self {
            credentials,
            http,
            compute_endpoint: settings.compute_endpoint(),
            project: settings.project.clone().filter(|p| !p.is_empty()),
            operation_wait: OperationWait::default(),
        };

        tracing::info!(
            endpoint = %client.compute_endpoint,
            project = client.project.as_deref().unwrap_or(""),
            "Google client configured"
        );
        Ok(client)
    }

    /// Override how long-running operations are awaited.
    pub fn with_operation_wait(mut self, wait: OperationWait) -> Self {
        self.operation_wait = wait;
        self
    }

    pub fn operation_wait(&self) -> &OperationWait {
        &self.operation_wait
    }

    /// Provider-level default project
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    async fn token(&self) -> GoogleResult<String> {
        self.credentials
            .get_token()
            .await
            .map_err(|e| GoogleError::Auth(format!("{:#}", e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> GoogleResult<T> {
        let token = self.token().await?;
        self.http.get(url, &token).await
    }

    pub async fn post<B, T>(&self, url: &str, body: &B) -> GoogleResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.token().await?;
        self.http.post(url, &token, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> GoogleResult<T> {
        let token = self.token().await?;
        self.http.delete(url, &token).await
    }

    /// Build Compute Engine API URL
    pub fn compute_url(&self, project: &str, path: &str) -> String {
        format!("{}projects/{}/{}", self.compute_endpoint, project, path)
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, project: &str, zone: &str, resource: &str) -> String {
        self.compute_url(project, &format!("zones/{}/{}", zone, resource))
    }

    /// Build regional Compute Engine API URL
    pub fn compute_regional_url(&self, project: &str, region: &str, resource: &str) -> String {
        self.compute_url(project, &format!("regions/{}/{}", region, resource))
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("global/{}", resource))
    }
}
