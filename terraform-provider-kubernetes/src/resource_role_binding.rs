//! `kubernetes_role_binding`
//!
//! Grants the permissions of a Role or ClusterRole to users, groups or
//! service accounts within one namespace. The role reference is immutable;
//! changing it replaces the binding.

use crate::client::KubeClient;
use crate::rbac;
use crate::structures::{
    build_id, configured_labels_and_annotations, expand_metadata, flatten_metadata, id_parts,
    namespaced_metadata_schema,
};
use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use provider_common::{
    NestedBlock, ProviderError, ProviderResult, Resource, ResourceData, ResourceSchema,
    SchemaAttribute, SchemaBlock,
};
use serde_json::{json, Map, Value};

pub const ROLE_BINDING: &str = "kubernetes_role_binding";

pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

const SERVICE_ACCOUNT: &str = "ServiceAccount";

pub struct RoleBindingResource;

fn role_ref_schema() -> NestedBlock {
    let block = SchemaBlock::new()
        .with_attribute(
            "api_group",
            SchemaAttribute::string()
                .optional()
                .with_default(json!(RBAC_API_GROUP))
                .one_of(&[RBAC_API_GROUP])
                .with_description("The API group of the referenced role"),
        )
        .with_attribute(
            "kind",
            SchemaAttribute::string()
                .required()
                .one_of(&["Role", "ClusterRole"])
                .with_description("The kind of the referenced role"),
        )
        .with_attribute(
            "name",
            SchemaAttribute::string()
                .required()
                .with_description("The name of the referenced role"),
        );

    NestedBlock::list(block)
        .required()
        .with_max_items(1)
        .force_new()
}

fn subject_schema() -> NestedBlock {
    let block = SchemaBlock::new()
        .with_attribute(
            "kind",
            SchemaAttribute::string()
                .required()
                .one_of(&["User", "Group", SERVICE_ACCOUNT])
                .with_description("The kind of subject to bind to"),
        )
        .with_attribute(
            "name",
            SchemaAttribute::string()
                .required()
                .with_description("The name of the subject"),
        )
        .with_attribute(
            "namespace",
            SchemaAttribute::string()
                .optional()
                .computed()
                .with_description("Namespace of a ServiceAccount subject, defaults to \"default\""),
        )
        .with_attribute(
            "api_group",
            SchemaAttribute::string()
                .optional()
                .computed()
                .with_description("The API group of the subject"),
        );

    NestedBlock::list(block).required()
}

fn field<'a>(m: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    m.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

pub(crate) fn expand_role_ref(values: &[Value]) -> RoleRef {
    let empty = Map::new();
    let m = values.first().and_then(|v| v.as_object()).unwrap_or(&empty);

    RoleRef {
        api_group: field(m, "api_group").unwrap_or(RBAC_API_GROUP).to_string(),
        kind: field(m, "kind").unwrap_or_default().to_string(),
        name: field(m, "name").unwrap_or_default().to_string(),
    }
}

pub(crate) fn flatten_role_ref(role_ref: &RoleRef) -> Value {
    json!([{
        "api_group": role_ref.api_group,
        "kind": role_ref.kind,
        "name": role_ref.name,
    }])
}

/// User and Group subjects live in the RBAC API group; service accounts
/// are core objects and carry a namespace instead.
pub(crate) fn expand_subjects(values: &[Value]) -> Vec<Subject> {
    values
        .iter()
        .filter_map(|v| v.as_object())
        .map(|m| {
            let kind = field(m, "kind").unwrap_or_default().to_string();
            let is_service_account = kind == SERVICE_ACCOUNT;

            let api_group = match field(m, "api_group") {
                Some(group) => Some(group.to_string()),
                None if is_service_account => None,
                None => Some(RBAC_API_GROUP.to_string()),
            };
            let namespace = is_service_account.then(|| {
                field(m, "namespace")
                    .unwrap_or(crate::structures::DEFAULT_NAMESPACE)
                    .to_string()
            });

            Subject {
                kind,
                name: field(m, "name").unwrap_or_default().to_string(),
                api_group,
                namespace,
            }
        })
        .collect()
}

pub(crate) fn flatten_subjects(subjects: &[Subject]) -> Value {
    Value::Array(
        subjects
            .iter()
            .map(|s| {
                let namespace = if s.kind == SERVICE_ACCOUNT {
                    s.namespace.clone()
                } else {
                    None
                };
                json!({
                    "kind": s.kind,
                    "name": s.name,
                    "namespace": namespace,
                    "api_group": s.api_group.as_deref().filter(|g| !g.is_empty()),
                })
            })
            .collect(),
    )
}

fn set_binding(d: &mut ResourceData, binding: &RoleBinding) {
    let metadata = flatten_metadata(&binding.metadata, &d.get_list("metadata"));
    d.set("metadata", metadata);
    d.set("role_ref", flatten_role_ref(&binding.role_ref));
    d.set(
        "subject",
        flatten_subjects(binding.subjects.as_deref().unwrap_or_default()),
    );
}

#[async_trait]
impl Resource<KubeClient> for RoleBindingResource {
    fn type_name(&self) -> &str {
        ROLE_BINDING
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(
            0,
            SchemaBlock::new()
                .with_description("A RoleBinding grants the permissions defined in a role to a set of subjects within a namespace")
                .with_block("metadata", namespaced_metadata_schema("roleBinding"))
                .with_block("role_ref", role_ref_schema())
                .with_block("subject", subject_schema()),
        )
    }

    async fn create(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let binding = RoleBinding {
            metadata: expand_metadata(&d.get_list("metadata")),
            role_ref: expand_role_ref(&d.get_list("role_ref")),
            subjects: Some(expand_subjects(&d.get_list("subject"))),
        };
        let id = build_id(&binding.metadata);
        let (namespace, _) = id_parts(&id)?;

        tracing::info!(id = %id, "Creating new role binding");
        let created = rbac::create_role_binding(client, &namespace, &binding)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to create role binding {}", id), e))?;
        tracing::info!(id = %id, uid = ?created.metadata.uid, "Submitted new role binding");

        d.set_id(build_id(&created.metadata));
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let (namespace, name) = id_parts(d.id())?;

        tracing::debug!(id = d.id(), "Reading role binding");
        match rbac::get_role_binding(client, &namespace, &name).await {
            Ok(binding) => {
                set_binding(d, &binding);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = d.id(), "Role binding not found, removing from state");
                d.set_id("");
                Ok(())
            }
            Err(e) => Err(ProviderError::api(
                format!("Failed to read role binding {}", d.id()),
                e,
            )),
        }
    }

    async fn update(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let (namespace, name) = id_parts(d.id())?;

        let mut current = rbac::get_role_binding(client, &namespace, &name)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to read role binding {}", d.id()), e))?;

        if d.has_change("metadata") {
            let (labels, annotations) = configured_labels_and_annotations(&d.get_list("metadata"));
            current.metadata.labels = Some(labels);
            current.metadata.annotations = Some(annotations);
        }
        if d.has_change("subject") {
            current.subjects = Some(expand_subjects(&d.get_list("subject")));
        }

        tracing::info!(
            id = d.id(),
            resource_version = ?current.metadata.resource_version,
            "Updating role binding"
        );
        rbac::replace_role_binding(client, &namespace, &name, &current)
            .await
            .map_err(|e| {
                ProviderError::api(format!("Failed to update role binding {}", d.id()), e)
            })?;

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<()> {
        let (namespace, name) = id_parts(d.id())?;

        tracing::info!(id = d.id(), "Deleting role binding");
        match rbac::delete_role_binding(client, &namespace, &name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = d.id(), "Role binding already gone");
            }
            Err(e) => {
                return Err(ProviderError::api(
                    format!("Failed to delete role binding {}", d.id()),
                    e,
                ))
            }
        }

        d.set_id("");
        Ok(())
    }

    async fn exists(&self, d: &mut ResourceData, client: &KubeClient) -> ProviderResult<bool> {
        let (namespace, name) = id_parts(d.id())?;

        tracing::debug!(id = d.id(), "Checking role binding");
        match rbac::get_role_binding(client, &namespace, &name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::warn!(id = d.id(), "Role binding is gone, removing from state");
                d.set_id("");
                Ok(false)
            }
            Err(e) => Err(ProviderError::api(
                format!("Failed to read role binding {}", d.id()),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_common::ResourceState;

    #[test]
    fn test_expand_subjects_defaults_by_kind() {
        let subjects = expand_subjects(&[
            json!({"kind": "Group", "name": "monitoring", "namespace": null, "api_group": null}),
            json!({"kind": "ServiceAccount", "name": "builder", "namespace": null, "api_group": null}),
            json!({"kind": "ServiceAccount", "name": "deployer", "namespace": "ci"}),
            json!({"kind": "User", "name": "gary", "namespace": "ignored"}),
        ]);

        assert_eq!(subjects[0].api_group.as_deref(), Some(RBAC_API_GROUP));
        assert!(subjects[0].namespace.is_none());
        assert!(subjects[1].api_group.is_none());
        assert_eq!(subjects[1].namespace.as_deref(), Some("default"));
        assert_eq!(subjects[2].namespace.as_deref(), Some("ci"));
        assert!(subjects[3].namespace.is_none());
    }

    #[test]
    fn test_flatten_subjects() {
        let flat = flatten_subjects(&[
            Subject {
                kind: "ServiceAccount".into(),
                name: "builder".into(),
                namespace: Some("ci".into()),
                api_group: Some(String::new()),
            },
            Subject {
                kind: "User".into(),
                name: "gary".into(),
                namespace: Some("stray".into()),
                api_group: Some(RBAC_API_GROUP.into()),
            },
        ]);

        assert_eq!(flat[0]["namespace"], "ci");
        assert_eq!(flat[0]["api_group"], Value::Null);
        assert_eq!(flat[1]["namespace"], Value::Null);
        assert_eq!(flat[1]["api_group"], RBAC_API_GROUP);
    }

    #[test]
    fn test_role_ref_round_trip() {
        let role_ref = expand_role_ref(&[json!({"kind": "ClusterRole", "name": "view"})]);
        assert_eq!(role_ref.api_group, RBAC_API_GROUP);
        assert_eq!(flatten_role_ref(&role_ref)[0]["kind"], "ClusterRole");
    }

    #[test]
    fn test_schema_requires_role_ref_and_subject() {
        let schema = RoleBindingResource.schema();
        let diagnostics = schema
            .block
            .validate_config(&json!({"metadata": {"name": "rb"}}));

        let summaries: Vec<&str> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Insufficient blocks", "Insufficient blocks"]);
    }

    #[test]
    fn test_schema_rejects_unknown_subject_kind() {
        let schema = RoleBindingResource.schema();
        let diagnostics = schema.block.validate_config(&json!({
            "metadata": {"name": "rb"},
            "role_ref": {"kind": "Role", "name": "r"},
            "subject": [{"kind": "Robot", "name": "r2d2"}]
        }));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid value");
        assert_eq!(diagnostics[0].attribute.as_ref().unwrap().join("."), "subject.0.kind");
    }

    #[test]
    fn test_role_ref_change_requires_replacement() {
        let block = RoleBindingResource.schema().block;
        let prior = block.normalize(&json!({
            "metadata": {"name": "rb", "namespace": "default"},
            "role_ref": {"api_group": RBAC_API_GROUP, "kind": "Role", "name": "a"},
            "subject": [{"kind": "Group", "name": "ops"}]
        }));
        let mut planned = block.normalize(&json!({
            "metadata": {"name": "rb"},
            "role_ref": {"kind": "Role", "name": "b"},
            "subject": [{"kind": "Group", "name": "ops"}, {"kind": "User", "name": "gary"}]
        }));
        block.apply_defaults(&mut planned);

        let paths = block.requires_replace(&prior, &planned);
        assert_eq!(paths, vec![vec!["role_ref".to_string()]]);

        let state = ResourceState::from(planned);
        assert_eq!(state.get("metadata").unwrap()[0]["namespace"], "default");
    }
}
