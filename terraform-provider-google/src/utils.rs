//! Helpers shared by Google resources

use crate::client::GoogleClient;
use provider_common::{ProviderError, ProviderResult, ResourceData};
use std::collections::BTreeMap;

/// Project of the resource, falling back to the provider's.
pub fn get_project(d: &ResourceData, client: &GoogleClient) -> ProviderResult<String> {
    d.get_string("project")
        .filter(|p| !p.is_empty())
        .or_else(|| client.project().map(String::from))
        .ok_or_else(|| {
            ProviderError::Other(
                "project: required field is not set on the resource or the provider".to_string(),
            )
        })
}

/// Last path segment of a self link; plain names pass through.
pub fn get_resource_name_from_self_link(link: &str) -> &str {
    link.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(link)
}

pub fn expand_labels(d: &ResourceData) -> BTreeMap<String, String> {
    d.get_string_map("labels")
}
