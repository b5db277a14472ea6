//! Provider configuration
//!
//! The provider block deserializes into [`KubeProviderConfig`]; unset
//! arguments fall back to `KUBE_*` environment variables. Explicit settings
//! are layered over the selected kubeconfig context by rewriting the
//! kubeconfig document before kube-rs parses it.

use crate::error::{K8sError, K8sResult};
use base64::Engine;
use kube::config::KubeConfigOptions;
use provider_common::{ProviderError, ProviderResult, ResourceState};
use serde::Deserialize;
use serde_yaml::{Mapping, Value as Yaml};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "~/.kube/config";

const DEFAULT_ENTRY: &str = "terraform";

/// Settings of the `provider "kubernetes"` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KubeProviderConfig {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub insecure: Option<bool>,
    pub client_certificate: Option<String>,
    pub client_key: Option<String>,
    pub cluster_ca_certificate: Option<String>,
    pub config_path: Option<String>,
    pub config_context: Option<String>,
    pub config_context_auth_info: Option<String>,
    pub config_context_cluster: Option<String>,
    pub load_config_file: Option<bool>,
}

impl KubeProviderConfig {
    pub fn from_state(config: &ResourceState) -> ProviderResult<Self> {
        serde_json::from_value(config.to_value())
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
    }

    /// Fill unset settings from the process environment.
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks(|key| std::env::var(key).ok())
    }

    /// Fill unset settings from `lookup`, keyed by environment variable name.
    pub fn with_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let boolean = |key: &str| string(key).and_then(|v| parse_bool(&v));

        self.host = self.host.or_else(|| string("KUBE_HOST"));
        self.username = self.username.or_else(|| string("KUBE_USER"));
        self.password = self.password.or_else(|| string("KUBE_PASSWORD"));
        self.token = self.token.or_else(|| string("KUBE_TOKEN"));
        self.insecure = self.insecure.or_else(|| boolean("KUBE_INSECURE"));
        self.client_certificate = self
            .client_certificate
            .or_else(|| string("KUBE_CLIENT_CERT_DATA"));
        self.client_key = self.client_key.or_else(|| string("KUBE_CLIENT_KEY_DATA"));
        self.cluster_ca_certificate = self
            .cluster_ca_certificate
            .or_else(|| string("KUBE_CLUSTER_CA_CERT_DATA"));
        self.config_path = self.config_path.or_else(|| string("KUBE_CONFIG"));
        self.config_context = self.config_context.or_else(|| string("KUBE_CTX"));
        self.config_context_auth_info = self
            .config_context_auth_info
            .or_else(|| string("KUBE_CTX_AUTH_INFO"));
        self.config_context_cluster = self
            .config_context_cluster
            .or_else(|| string("KUBE_CTX_CLUSTER"));
        self.load_config_file = self
            .load_config_file
            .or_else(|| boolean("KUBE_LOAD_CONFIG_FILE"));
        self
    }

    pub fn should_load_config_file(&self) -> bool {
        self.load_config_file.unwrap_or(true)
    }

    /// Kubeconfig location with `~` expanded
    pub fn config_file(&self) -> PathBuf {
        let path = self.config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
            (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
            _ => PathBuf::from(path),
        }
    }

    fn has_auth_settings(&self) -> bool {
        self.username.is_some()
            || self.password.is_some()
            || self.token.is_some()
            || self.client_certificate.is_some()
            || self.client_key.is_some()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Some(true),
        "0" | "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

fn encode_pem(pem: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(pem.as_bytes())
}

/// Render the kubeconfig document to connect with: `base` (the loaded file,
/// if any) with the context/cluster/user selection resolved and explicit
/// settings written into the selected cluster and user entries.
pub fn render_kubeconfig(
    base: Option<&str>,
    settings: &KubeProviderConfig,
) -> K8sResult<(String, KubeConfigOptions)> {
    let mut doc = match base {
        Some(text) => serde_yaml::from_str::<Yaml>(text).map_err(|e| {
            K8sError::InvalidKubeconfig(format!("Failed to parse kubeconfig: {}", e))
        })?,
        None => Yaml::Mapping(Mapping::new()),
    };
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| K8sError::InvalidKubeconfig("kubeconfig is not a mapping".into()))?;

    root.entry(key("apiVersion")).or_insert_with(|| "v1".into());
    root.entry(key("kind")).or_insert_with(|| "Config".into());
    for section in ["clusters", "users", "contexts"] {
        let slot = root.entry(key(section)).or_insert(Yaml::Null);
        if !slot.is_sequence() {
            *slot = Yaml::Sequence(Vec::new());
        }
    }

    let current = root
        .get("current-context")
        .and_then(|v| v.as_str())
        .map(String::from);
    let context_name = settings
        .config_context
        .clone()
        .or(current)
        .unwrap_or_else(|| DEFAULT_ENTRY.to_string());

    if base.is_some()
        && settings.config_context.is_some()
        && !has_entry(root, "contexts", &context_name)
    {
        return Err(K8sError::InvalidKubeconfig(format!(
            "Context '{}' not found",
            context_name
        )));
    }
    let context = named_entry(root, "contexts", "context", &context_name)?;
    let context_cluster = context
        .get("cluster")
        .and_then(|v| v.as_str())
        .map(String::from);
    let context_user = context
        .get("user")
        .and_then(|v| v.as_str())
        .map(String::from);

    let cluster_name = settings
        .config_context_cluster
        .clone()
        .or(context_cluster)
        .unwrap_or_else(|| DEFAULT_ENTRY.to_string());
    let user_name = settings
        .config_context_auth_info
        .clone()
        .or(context_user)
        .unwrap_or_else(|| DEFAULT_ENTRY.to_string());

    context.insert(key("cluster"), cluster_name.as_str().into());
    context.insert(key("user"), user_name.as_str().into());
    root.insert(key("current-context"), context_name.as_str().into());

    let cluster = named_entry(root, "clusters", "cluster", &cluster_name)?;
    if let Some(host) = &settings.host {
        cluster.insert(key("server"), host.as_str().into());
    }
    if let Some(ca) = &settings.cluster_ca_certificate {
        cluster.remove("certificate-authority");
        cluster.insert(key("certificate-authority-data"), encode_pem(ca).into());
    }
    if let Some(insecure) = settings.insecure {
        cluster.insert(key("insecure-skip-tls-verify"), insecure.into());
    }

    if settings.has_auth_settings() {
        let mut auth = Mapping::new();
        if let Some(username) = &settings.username {
            auth.insert(key("username"), username.as_str().into());
        }
        if let Some(password) = &settings.password {
            auth.insert(key("password"), password.as_str().into());
        }
        if let Some(token) = &settings.token {
            auth.insert(key("token"), token.as_str().into());
        }
        if let Some(cert) = &settings.client_certificate {
            auth.insert(key("client-certificate-data"), encode_pem(cert).into());
        }
        if let Some(client_key) = &settings.client_key {
            auth.insert(key("client-key-data"), encode_pem(client_key).into());
        }
        *named_entry(root, "users", "user", &user_name)? = auth;
    } else {
        named_entry(root, "users", "user", &user_name)?;
    }

    let rendered = serde_yaml::to_string(&doc)
        .map_err(|e| K8sError::InvalidKubeconfig(format!("Failed to render kubeconfig: {}", e)))?;

    let options = KubeConfigOptions {
        context: Some(context_name),
        cluster: Some(cluster_name),
        user: Some(user_name),
    };

    Ok((rendered, options))
}

fn key(name: &str) -> Yaml {
    Yaml::String(name.to_string())
}

fn has_entry(root: &Mapping, section: &str, name: &str) -> bool {
    root.get(section)
        .and_then(|v| v.as_sequence())
        .map(|entries| {
            entries
                .iter()
                .any(|e| e.get("name").and_then(|n| n.as_str()) == Some(name))
        })
        .unwrap_or(false)
}

/// The `field` mapping of the entry called `name` in `section`, created
/// when missing.
fn named_entry<'a>(
    root: &'a mut Mapping,
    section: &str,
    field: &str,
    name: &str,
) -> K8sResult<&'a mut Mapping> {
    let malformed = || K8sError::InvalidKubeconfig(format!("Malformed {} section", section));

    let entries = root
        .get_mut(section)
        .and_then(|v| v.as_sequence_mut())
        .ok_or_else(malformed)?;

    let position = entries
        .iter()
        .position(|e| e.get("name").and_then(|n| n.as_str()) == Some(name));
    let index = match position {
        Some(index) => index,
        None => {
            let mut entry = Mapping::new();
            entry.insert(key("name"), name.into());
            entries.push(Yaml::Mapping(entry));
            entries.len() - 1
        }
    };

    let entry = entries[index].as_mapping_mut().ok_or_else(malformed)?;
    let slot = entry
        .entry(key(field))
        .or_insert_with(|| Yaml::Mapping(Mapping::new()));
    if slot.is_null() {
        *slot = Yaml::Mapping(Mapping::new());
    }
    slot.as_mapping_mut().ok_or_else(malformed)
}
