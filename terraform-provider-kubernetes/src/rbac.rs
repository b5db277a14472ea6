//! RBAC operations
//!
//! Namespaced Roles and RoleBindings.

use crate::client::KubeClient;
use crate::error::K8sResult;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::{Api, DeleteParams, PostParams};

// ============================================================================
// Role Operations
// ============================================================================

/// Get a specific Role
pub async fn get_role(client: &KubeClient, namespace: &str, name: &str) -> K8sResult<Role> {
    let roles: Api<Role> = Api::namespaced(client.inner().clone(), namespace);
    Ok(roles.get(name).await?)
}

/// Create a new Role
pub async fn create_role(client: &KubeClient, namespace: &str, role: &Role) -> K8sResult<Role> {
    let roles: Api<Role> = Api::namespaced(client.inner().clone(), namespace);
    Ok(roles.create(&PostParams::default(), role).await?)
}

/// Replace a Role; `role` must carry the resourceVersion it was read at
pub async fn replace_role(
    client: &KubeClient,
    namespace: &str,
    name: &str,
    role: &Role,
) -> K8sResult<Role> {
    let roles: Api<Role> = Api::namespaced(client.inner().clone(), namespace);
    Ok(roles.replace(name, &PostParams::default(), role).await?)
}

/// Delete a Role
pub async fn delete_role(client: &KubeClient, namespace: &str, name: &str) -> K8sResult<()> {
    let roles: Api<Role> = Api::namespaced(client.inner().clone(), namespace);
    roles.delete(name, &DeleteParams::default()).await?;

    Ok(())
}

// ============================================================================
// RoleBinding Operations
// ============================================================================

/// Get a specific RoleBinding
pub async fn get_role_binding(
    client: &KubeClient,
    namespace: &str,
    name: &str,
) -> K8sResult<RoleBinding> {
    let bindings: Api<RoleBinding> = Api::namespaced(client.inner().clone(), namespace);
    Ok(bindings.get(name).await?)
}

/// Create a new RoleBinding
pub async fn create_role_binding(
    client: &KubeClient,
    namespace: &str,
    binding: &RoleBinding,
) -> K8sResult<RoleBinding> {
    let bindings: Api<RoleBinding> = Api::namespaced(client.inner().clone(), namespace);
    Ok(bindings.create(&PostParams::default(), binding).await?)
}

/// Replace a RoleBinding; `binding` must carry the resourceVersion it was
/// read at
pub async fn replace_role_binding(
    client: &KubeClient,
    namespace: &str,
    name: &str,
    binding: &RoleBinding,
) -> K8sResult<RoleBinding> {
    let bindings: Api<RoleBinding> = Api::namespaced(client.inner().clone(), namespace);
    Ok(bindings.replace(name, &PostParams::default(), binding).await?)
}

/// Delete a RoleBinding
pub async fn delete_role_binding(
    client: &KubeClient,
    namespace: &str,
    name: &str,
) -> K8sResult<()> {
    let bindings: Api<RoleBinding> = Api::namespaced(client.inner().clone(), namespace);
    bindings.delete(name, &DeleteParams::default()).await?;

    Ok(())
}
