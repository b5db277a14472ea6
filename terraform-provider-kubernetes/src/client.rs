//! Kubernetes client wrapper
//!
//! Wraps the kube-rs Client together with the API server it talks to.

use crate::config::{render_kubeconfig, KubeProviderConfig};
use crate::error::{K8sError, K8sResult};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Wrapper around kube-rs Client
#[derive(Clone)]
pub struct KubeClient {
    inner: Client,
    api_server: String,
}

impl KubeClient {
    /// Resolve provider settings into a client: the kubeconfig file with
    /// explicit settings layered on top, static settings alone, or the
    /// in-cluster service account.
    pub async fn connect(settings: &KubeProviderConfig) -> K8sResult<Self> {
        let mut base = None;
        if settings.should_load_config_file() {
            let path = settings.config_file();
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::debug!(path = %path.display(), "Loading kubeconfig");
                let text = tokio::fs::read_to_string(&path).await.map_err(|source| {
                    K8sError::ConfigFile {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                base = Some(text);
            }
        }

        if base.is_none() && settings.host.is_none() {
            tracing::info!("No kubeconfig or host configured, using in-cluster configuration");
            return Self::from_incluster();
        }

        let (yaml, options) = render_kubeconfig(base.as_deref(), settings)?;
        Self::from_kubeconfig(&yaml, &options).await
    }

    /// Create client from kubeconfig YAML with the given selection
    pub async fn from_kubeconfig(
        kubeconfig_yaml: &str,
        options: &KubeConfigOptions,
    ) -> K8sResult<Self> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig_yaml).map_err(|e| {
            K8sError::InvalidKubeconfig(format!("Failed to parse kubeconfig: {}", e))
        })?;

        let config = Config::from_custom_kubeconfig(kubeconfig, options)
            .await
            .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to create config: {}", e)))?;

        Self::from_config(config)
    }

    /// Create client from in-cluster configuration (for running inside K8s)
    pub fn from_incluster() -> K8sResult<Self> {
        let config = Config::incluster().map_err(|e| {
            K8sError::InvalidKubeconfig(format!("Failed to get in-cluster config: {}", e))
        })?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> K8sResult<Self> {
        let api_server = config.cluster_url.to_string();

        let inner = Client::try_from(config)
            .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to create client: {}", e)))?;

        tracing::info!(api_server = %api_server, "Kubernetes client configured");

        Ok(Self { inner, api_server })
    }

    /// Get the inner kube-rs Client
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Get API server URL
    pub fn api_server(&self) -> &str {
        &self.api_server
    }
}

impl std::fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClient")
            .field("api_server", &self.api_server)
            .finish()
    }
}
