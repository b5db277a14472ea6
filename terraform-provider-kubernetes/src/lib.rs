//! Terraform provider for Kubernetes RBAC objects
//!
//! Manages Roles and RoleBindings through kube-rs, speaking the plugin
//! protocol implemented in `provider-common`.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod rbac;
pub mod resource_role;
pub mod resource_role_binding;
pub mod structures;

pub use client::KubeClient;
pub use error::{K8sError, K8sResult};
pub use provider::KubernetesProvider;
pub use resource_role::ROLE;
pub use resource_role_binding::ROLE_BINDING;
