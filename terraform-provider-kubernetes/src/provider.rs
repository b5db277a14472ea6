//! Kubernetes provider definition

use crate::client::KubeClient;
use crate::config::{KubeProviderConfig, DEFAULT_CONFIG_PATH};
use crate::resource_role::RoleResource;
use crate::resource_role_binding::RoleBindingResource;
use async_trait::async_trait;
use provider_common::{
    ProviderDefinition, ProviderError, ProviderResult, Resource, ResourceState, SchemaAttribute,
    SchemaBlock,
};

pub struct KubernetesProvider;

#[async_trait]
impl ProviderDefinition for KubernetesProvider {
    type Meta = KubeClient;

    fn name(&self) -> &str {
        "kubernetes"
    }

    fn schema(&self) -> SchemaBlock {
        SchemaBlock::new()
            .with_attribute(
                "host",
                SchemaAttribute::string()
                    .with_description("The hostname (in form of URI) of Kubernetes master. Can be sourced from `KUBE_HOST`.")
                    .optional(),
            )
            .with_attribute(
                "username",
                SchemaAttribute::string()
                    .with_description("The username to use for HTTP basic authentication when accessing the Kubernetes master endpoint. Can be sourced from `KUBE_USER`.")
                    .optional(),
            )
            .with_attribute(
                "password",
                SchemaAttribute::string()
                    .with_description("The password to use for HTTP basic authentication when accessing the Kubernetes master endpoint. Can be sourced from `KUBE_PASSWORD`.")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "token",
                SchemaAttribute::string()
                    .with_description("Token to authenticate a service account. Can be sourced from `KUBE_TOKEN`.")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "insecure",
                SchemaAttribute::bool()
                    .with_description("Whether server should be accessed without verifying the TLS certificate. Can be sourced from `KUBE_INSECURE`.")
                    .optional(),
            )
            .with_attribute(
                "client_certificate",
                SchemaAttribute::string()
                    .with_description("PEM-encoded client certificate for TLS authentication. Can be sourced from `KUBE_CLIENT_CERT_DATA`.")
                    .optional(),
            )
            .with_attribute(
                "client_key",
                SchemaAttribute::string()
                    .with_description("PEM-encoded client certificate key for TLS authentication. Can be sourced from `KUBE_CLIENT_KEY_DATA`.")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "cluster_ca_certificate",
                SchemaAttribute::string()
                    .with_description("PEM-encoded root certificates bundle for TLS authentication. Can be sourced from `KUBE_CLUSTER_CA_CERT_DATA`.")
                    .optional(),
            )
            .with_attribute(
                "config_path",
                SchemaAttribute::string()
                    .with_description(&format!("Path to the kube config file, defaults to {}. Can be sourced from `KUBE_CONFIG`.", DEFAULT_CONFIG_PATH))
                    .optional(),
            )
            .with_attribute(
                "config_context",
                SchemaAttribute::string()
                    .with_description("Context to choose from the config file. Can be sourced from `KUBE_CTX`.")
                    .optional(),
            )
            .with_attribute(
                "config_context_auth_info",
                SchemaAttribute::string()
                    .with_description("Authentication info context of the kube config (name of the kubeconfig user). Can be sourced from `KUBE_CTX_AUTH_INFO`.")
                    .optional(),
            )
            .with_attribute(
                "config_context_cluster",
                SchemaAttribute::string()
                    .with_description("Cluster context of the kube config (name of the kubeconfig cluster). Can be sourced from `KUBE_CTX_CLUSTER`.")
                    .optional(),
            )
            .with_attribute(
                "load_config_file",
                SchemaAttribute::bool()
                    .with_description("Load local kubeconfig, defaults to true. Can be sourced from `KUBE_LOAD_CONFIG_FILE`.")
                    .optional(),
            )
    }

    fn resources(&self) -> Vec<Box<dyn Resource<KubeClient>>> {
        vec![Box::new(RoleResource), Box::new(RoleBindingResource)]
    }

    async fn configure(&self, config: &ResourceState) -> ProviderResult<KubeClient> {
        let settings = KubeProviderConfig::from_state(config)?.with_env_fallbacks();

        KubeClient::connect(&settings)
            .await
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
    }
}
