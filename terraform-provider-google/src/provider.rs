//! Google provider definition

use crate::client::GoogleClient;
use crate::config::{GoogleProviderConfig, DEFAULT_COMPUTE_ENDPOINT};
use crate::resource_compute_snapshot::ComputeSnapshotResource;
use async_trait::async_trait;
use provider_common::{
    ProviderDefinition, ProviderError, ProviderResult, Resource, ResourceState, SchemaAttribute,
    SchemaBlock,
};

pub struct GoogleProvider;

#[async_trait]
impl ProviderDefinition for GoogleProvider {
    type Meta = GoogleClient;

    fn name(&self) -> &str {
        "google"
    }

    fn schema(&self) -> SchemaBlock {
        SchemaBlock::new()
            .with_attribute(
                "credentials",
                SchemaAttribute::string()
                    .with_description("Path to or contents of a service account key file in JSON format. Can be sourced from `GOOGLE_CREDENTIALS`, `GOOGLE_CLOUD_KEYFILE_JSON` or `GCLOUD_KEYFILE_JSON`.")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "access_token",
                SchemaAttribute::string()
                    .with_description("A temporary OAuth 2.0 access token; takes precedence over `credentials`. Can be sourced from `GOOGLE_OAUTH_ACCESS_TOKEN`.")
                    .optional()
                    .sensitive(),
            )
            .with_attribute(
                "project",
                SchemaAttribute::string()
                    .with_description("The default project to manage resources in. Can be sourced from `GOOGLE_PROJECT`, `GOOGLE_CLOUD_PROJECT`, `GCLOUD_PROJECT` or `CLOUDSDK_CORE_PROJECT`.")
                    .optional(),
            )
            .with_attribute(
                "region",
                SchemaAttribute::string()
                    .with_description("The default region. Can be sourced from `GOOGLE_REGION`.")
                    .optional(),
            )
            .with_attribute(
                "zone",
                SchemaAttribute::string()
                    .with_description("The default zone. Can be sourced from `GOOGLE_ZONE`.")
                    .optional(),
            )
            .with_attribute(
                "compute_custom_endpoint",
                SchemaAttribute::string()
                    .with_description(&format!("Base URL of the Compute Engine API, defaults to {}. Can be sourced from `GOOGLE_COMPUTE_CUSTOM_ENDPOINT`.", DEFAULT_COMPUTE_ENDPOINT))
                    .optional(),
            )
    }

    fn resources(&self) -> Vec<Box<dyn Resource<GoogleClient>>> {
        vec![Box::new(ComputeSnapshotResource)]
    }

    async fn configure(&self, config: &ResourceState) -> ProviderResult<GoogleClient> {
        let settings = GoogleProviderConfig::from_state(config)?.with_env_fallbacks();

        GoogleClient::new(&settings)
            .await
            .map_err(|e| ProviderError::InvalidConfig(format!("{:#}", e)))
    }
}
