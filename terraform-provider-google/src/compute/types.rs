//! Compute Engine API resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEncryptionKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl CustomerEncryptionKey {
    pub fn raw(key: impl Into<String>) -> Self {
        Self {
            raw_key: Some(key.into()),
            sha256: None,
        }
    }
}

/// Persistent disk snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_disk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_encryption_key: Option<CustomerEncryptionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_disk_encryption_key: Option<CustomerEncryptionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_fingerprint: Option<String>,
}

/// Body of `snapshots.setLabels`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSetLabelsRequest {
    pub labels: BTreeMap<String, String>,
    pub label_fingerprint: String,
}

/// Long-running operation returned by every mutating call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    /// Zone URL for zonal operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Region URL for regional operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// Messages of every error the operation reported
    pub fn error_messages(&self) -> Vec<String> {
        self.error
            .as_ref()
            .map(|e| {
                e.errors
                    .iter()
                    .map(|item| {
                        if item.message.is_empty() {
                            item.code.clone()
                        } else {
                            item.message.clone()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
