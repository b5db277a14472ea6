//! `kubernetes_role`

use crate::client::KubeClient;
use crate::rbac;
use crate::structures::{
    build_id, configured_labels_and_annotations, expand_metadata, expand_string_list,
    flatten_metadata, id_parts, namespaced_metadata_schema,
};
use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role};
use provider_common::{
    AttributeType, NestedBlock, ProviderError, ProviderResult, Resource, ResourceData,
    ResourceSchema, SchemaAttribute, SchemaBlock,
};
use serde_json::{json, Value};

pub const ROLE: &str = "kubernetes_role";

pub struct RoleResource;

fn rule_schema() -> NestedBlock {
    let strings = || SchemaAttribute::list(AttributeType::String);
    let block = SchemaBlock::new()
        .with_attribute(
            "api_groups",
            strings()
                .required()
                .with_description("Name of the APIGroup that contains the resources"),
        )
        .with_attribute(
            "resources",
            strings()
                .required()
                .with_description("List of resources that the rule applies to"),
        )
        .with_attribute(
            "resource_names",
            strings()
                .optional()
                .with_description("White list of names that the rule applies to"),
        )
        .with_attribute(
            "verbs",
            strings()
                .required()
                .with_description("List of verbs that apply to all resource kinds in this rule"),
        );

    NestedBlock::list(block).required()
}

pub(crate) fn expand_rules(values: &[Value]) -> Vec<PolicyRule> {
    values
        .iter()
        .filter_map(|v| v.as_object())
        .map(|m| {
            let resource_names = expand_string_list(m.get("resource_names"));
            PolicyRule {
                api_groups: Some(expand_string_list(m.get("api_groups"))),
                resources: Some(expand_string_list(m.get("resources"))),
                resource_names: (!resource_names.is_empty()).then_some(resource_names),
                verbs: expand_string_list(m.get("verbs")),
                ..Default::default()
            }
        })
        .collect()
}

pub(crate) fn flatten_rules(rules: &[PolicyRule]) -> Value {
    Value::Array(
        rules
            .iter()
            .map(|r| {
                json!({
                    "api_groups": r.api_groups.clone().unwrap_or_default(),
                    "resources": r.resources.clone().unwrap_or_default(),
                    "resource_names": r.resource_names.clone().unwrap_or_default(),
                    "verbs": r.verbs,
                })
            })
            .collect(),
    )
}

#[async_trait]
impl Resource<KubeClient> for RoleResource {
    fn type_name(&self) -> &str {
        ROLE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(
            0,
            SchemaBlock::new()
                .with_block("metadata", namespaced_metadata_schema("role"))
                .with_block("rule", rule_schema()),
        )
    }

    async fn create(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let role = Role {
            metadata: expand_metadata(&d.get_list("metadata")),
            rules: Some(expand_rules(&d.get_list("rule"))),
        };
        let id = build_id(&role.metadata);
        let (namespace, _) = id_parts(&id)?;

        tracing::info!(id = %id, "Creating new role");
        let created = rbac::create_role(client, &namespace, &role)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to create role {}", id), e))?;

        d.set_id(build_id(&created.metadata));
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let (namespace, name) = id_parts(d.id())?;

        match rbac::get_role(client, &namespace, &name).await {
            Ok(role) => {
                let metadata = flatten_metadata(&role.metadata, &d.get_list("metadata"));
                d.set("metadata", metadata);
                d.set("rule", flatten_rules(role.rules.as_deref().unwrap_or_default()));
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = d.id(), "Role not found, removing from state");
                d.set_id("");
                Ok(())
            }
            Err(e) => Err(ProviderError::api(format!("Failed to read role {}", d.id()), e)),
        }
    }

    async fn update(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let (namespace, name) = id_parts(d.id())?;

        let mut current = rbac::get_role(client, &namespace, &name)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to read role {}", d.id()), e))?;

        if d.has_change("metadata") {
            let (labels, annotations) = configured_labels_and_annotations(&d.get_list("metadata"));
            current.metadata.labels = Some(labels);
            current.metadata.annotations = Some(annotations);
        }
        if d.has_change("rule") {
            current.rules = Some(expand_rules(&d.get_list("rule")));
        }

        tracing::info!(id = d.id(), "Updating role");
        rbac::replace_role(client, &namespace, &name, &current)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update role {}", d.id()), e))?;

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let (namespace, name) = id_parts(d.id())?;

        tracing::info!(id = d.id(), "Deleting role");
        match rbac::delete_role(client, &namespace, &name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = d.id(), "Role already gone");
            }
            Err(e) => {
                return Err(ProviderError::api(format!("Failed to delete role {}", d.id()), e))
            }
        }

        d.set_id("");
        Ok(())
    }

    async fn exists(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<bool> {
        let (namespace, name) = id_parts(d.id())?;

        match rbac::get_role(client, &namespace, &name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = d.id(), "Role is gone, removing from state");
                d.set_id("");
                Ok(false)
            }
            Err(e) => Err(ProviderError::api(format!("Failed to read role {}", d.id()), e)),
        }
    }
}
