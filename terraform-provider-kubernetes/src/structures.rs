//! Schema pieces and conversions shared by the Kubernetes resources.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use provider_common::state::string_map;
use provider_common::{
    AttributeType, NestedBlock, ProviderError, ProviderResult, SchemaAttribute, SchemaBlock,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_NAMESPACE: &str = "default";

/// The `metadata` block of a namespaced object
pub fn namespaced_metadata_schema(object_name: &str) -> NestedBlock {
    let block = SchemaBlock::new()
        .with_description(&format!("Standard {}'s metadata", object_name))
        .with_attribute(
            "name",
            SchemaAttribute::string()
                .required()
                .force_new()
                .with_description(&format!("Name of the {}, must be unique", object_name)),
        )
        .with_attribute(
            "namespace",
            SchemaAttribute::string()
                .optional()
                .force_new()
                .with_default(json!(DEFAULT_NAMESPACE))
                .with_description(&format!("Namespace defines the space within which name of the {} must be unique", object_name)),
        )
        .with_attribute(
            "labels",
            SchemaAttribute::map(AttributeType::String)
                .optional()
                .with_description("Map of string keys and values that can be used to organize and categorize objects"),
        )
        .with_attribute(
            "annotations",
            SchemaAttribute::map(AttributeType::String)
                .optional()
                .with_description("An unstructured key value map stored with the object"),
        )
        .with_attribute("generation", SchemaAttribute::number().computed())
        .with_attribute("resource_version", SchemaAttribute::string().computed())
        .with_attribute("self_link", SchemaAttribute::string().computed())
        .with_attribute("uid", SchemaAttribute::string().computed());

    NestedBlock::list(block).required().with_max_items(1)
}

fn first_object(values: &[Value]) -> Option<&Map<String, Value>> {
    values.first().and_then(|v| v.as_object())
}

fn non_empty(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Build object metadata from the `metadata` block.
pub fn expand_metadata(values: &[Value]) -> ObjectMeta {
    let Some(block) = first_object(values) else {
        return ObjectMeta::default();
    };
    let string = |key: &str| {
        block
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    ObjectMeta {
        name: string("name"),
        namespace: Some(string("namespace").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())),
        labels: non_empty(string_map(block.get("labels"))),
        annotations: non_empty(string_map(block.get("annotations"))),
        ..Default::default()
    }
}

/// Labels and annotations configured in the `metadata` block.
pub fn configured_labels_and_annotations(
    values: &[Value],
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    match first_object(values) {
        Some(block) => (
            string_map(block.get("labels")),
            string_map(block.get("annotations")),
        ),
        None => (BTreeMap::new(), BTreeMap::new()),
    }
}

/// Flatten object metadata into the `metadata` block. Keys in the
/// `kubernetes.io` domains are dropped unless the configuration sets them.
pub fn flatten_metadata(meta: &ObjectMeta, configured: &[Value]) -> Value {
    let (labels, annotations) = configured_labels_and_annotations(configured);

    json!([{
        "name": meta.name,
        "namespace": meta.namespace,
        "labels": remove_internal_keys(meta.labels.as_ref(), &labels),
        "annotations": remove_internal_keys(meta.annotations.as_ref(), &annotations),
        "generation": meta.generation,
        "resource_version": meta.resource_version,
        "self_link": meta.self_link,
        "uid": meta.uid,
    }])
}

fn remove_internal_keys(
    remote: Option<&BTreeMap<String, String>>,
    configured: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    remote
        .map(|entries| {
            entries
                .iter()
                .filter(|(k, _)| !is_internal_key(k) || configured.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Keys prefixed with a `kubernetes.io` domain are managed by Kubernetes.
pub fn is_internal_key(key: &str) -> bool {
    match key.split_once('/') {
        Some((domain, _)) => domain == "kubernetes.io" || domain.ends_with(".kubernetes.io"),
        None => false,
    }
}

/// Resource id for a namespaced object: `namespace/name`
pub fn build_id(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE),
        meta.name.as_deref().unwrap_or_default()
    )
}

/// Split a `namespace/name` id.
pub fn id_parts(id: &str) -> ProviderResult<(String, String)> {
    match id.split_once('/') {
        Some((namespace, name))
            if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((namespace.to_string(), name.to_string()))
        }
        _ => Err(ProviderError::invalid_id(id, "namespace/name")),
    }
}

/// String elements of a list value
pub fn expand_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
