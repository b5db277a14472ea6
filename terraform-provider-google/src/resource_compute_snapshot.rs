//! `google_compute_snapshot`
//!
//! A point-in-time copy of a zonal persistent disk. Everything except the
//! labels is immutable; labels are updated in place through `setLabels`,
//! guarded by the label fingerprint.

use crate::client::GoogleClient;
use crate::compute::snapshots;
use crate::compute::{compute_operation_wait, CustomerEncryptionKey, Snapshot};
use crate::utils::{expand_labels, get_project, get_resource_name_from_self_link};
use async_trait::async_trait;
use provider_common::{
    AttributeType, ProviderError, ProviderResult, Resource, ResourceData, ResourceSchema,
    SchemaAttribute, SchemaBlock,
};
use serde_json::json;

pub const COMPUTE_SNAPSHOT: &str = "google_compute_snapshot";

pub struct ComputeSnapshotResource;

fn raw_key(d: &ResourceData, key: &str) -> Option<CustomerEncryptionKey> {
    d.get_ok(key)
        .and_then(|v| v.as_str())
        .map(CustomerEncryptionKey::raw)
}

#[async_trait]
impl Resource<GoogleClient> for ComputeSnapshotResource {
    fn type_name(&self) -> &str {
        COMPUTE_SNAPSHOT
    }

    fn schema(&self) -> ResourceSchema {
        let computed = || SchemaAttribute::string().computed();

        ResourceSchema::new(
            0,
            SchemaBlock::new()
                .with_attribute("name", SchemaAttribute::string().required().force_new())
                .with_attribute("zone", SchemaAttribute::string().required().force_new())
                .with_attribute(
                    "source_disk",
                    SchemaAttribute::string()
                        .required()
                        .force_new()
                        .with_description("Name or self link of the disk to snapshot"),
                )
                .with_attribute("project", SchemaAttribute::string().optional().force_new())
                .with_attribute(
                    "snapshot_encryption_key_raw",
                    SchemaAttribute::string().optional().force_new().sensitive(),
                )
                .with_attribute("snapshot_encryption_key_sha256", computed())
                .with_attribute(
                    "source_disk_encryption_key_raw",
                    SchemaAttribute::string().optional().force_new().sensitive(),
                )
                .with_attribute("source_disk_encryption_key_sha256", computed())
                .with_attribute("source_disk_link", computed())
                .with_attribute("self_link", computed())
                .with_attribute("labels", SchemaAttribute::map(AttributeType::String).optional())
                .with_attribute("label_fingerprint", computed()),
        )
    }

    async fn create(&self, d: &mut ResourceData, client: &GoogleClient) -> ProviderResult<()> {
        let project = get_project(d, client)?;
        let zone = d.get_string("zone").unwrap_or_default();
        let source_disk = d.get_string("source_disk").unwrap_or_default();
        let disk = get_resource_name_from_self_link(&source_disk);

        let snapshot = Snapshot {
            name: d.get_string("name").unwrap_or_default(),
            snapshot_encryption_key: raw_key(d, "snapshot_encryption_key_raw"),
            source_disk_encryption_key: raw_key(d, "source_disk_encryption_key_raw"),
            ..Default::default()
        };

        tracing::info!(name = %snapshot.name, zone = %zone, disk = disk, "Creating snapshot");
        let op = snapshots::create_snapshot(client, &project, &zone, disk, &snapshot)
            .await
            .map_err(|e| ProviderError::api("Error creating snapshot", e))?;

        // The snapshot may exist even if the operation later fails.
        d.set_id(snapshot.name.clone());

        compute_operation_wait(client, op, &project, "Creating Snapshot")
            .await
            .map_err(|e| ProviderError::api("Error creating snapshot", e))?;

        let labels = expand_labels(d);
        if !labels.is_empty() {
            let current = snapshots::get_snapshot(client, &project, d.id())
                .await
                .map_err(|e| ProviderError::api("Error reading snapshot for label update", e))?;
            let fingerprint = current.label_fingerprint.unwrap_or_default();

            let op = snapshots::set_snapshot_labels(client, &project, d.id(), labels, &fingerprint)
                .await
                .map_err(|e| ProviderError::api("Error setting labels on snapshot", e))?;
            compute_operation_wait(client, op, &project, "Setting labels on snapshot")
                .await
                .map_err(|e| ProviderError::api("Error setting labels on snapshot", e))?;
        }

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &GoogleClient) -> ProviderResult<()> {
        let project = get_project(d, client)?;

        let snapshot = match snapshots::get_snapshot(client, &project, d.id()).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                tracing::warn!(name = d.id(), "Removing Snapshot because it's gone");
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return Err(ProviderError::api(format!("Error reading Snapshot {:?}", d.id()), e))
            }
        };

        d.set("self_link", json!(snapshot.self_link));
        d.set("source_disk_link", json!(snapshot.source_disk));
        d.set("name", json!(snapshot.name));

        if let Some(sha) = snapshot
            .snapshot_encryption_key
            .and_then(|k| k.sha256)
            .filter(|s| !s.is_empty())
        {
            d.set("snapshot_encryption_key_sha256", json!(sha));
        }
        if let Some(sha) = snapshot
            .source_disk_encryption_key
            .and_then(|k| k.sha256)
            .filter(|s| !s.is_empty())
        {
            d.set("source_disk_encryption_key_sha256", json!(sha));
        }

        d.set("labels", json!(snapshot.labels.unwrap_or_default()));
        d.set("label_fingerprint", json!(snapshot.label_fingerprint));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &GoogleClient) -> ProviderResult<()> {
        let project = get_project(d, client)?;

        d.partial(true);

        if d.has_change("labels") {
            let (stored, _) = d.get_change("label_fingerprint");
            let fingerprint = stored.as_str().unwrap_or_default().to_string();

            tracing::info!(name = d.id(), "Updating snapshot labels");
            let labels = expand_labels(d);
            let op = snapshots::set_snapshot_labels(client, &project, d.id(), labels, &fingerprint)
                .await
                .map_err(|e| ProviderError::api("Error setting labels on snapshot", e))?;
            compute_operation_wait(client, op, &project, "Setting labels on snapshot")
                .await
                .map_err(|e| ProviderError::api("Error setting labels on snapshot", e))?;

            d.set_partial("labels");
        }

        d.partial(false);

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &GoogleClient) -> ProviderResult<()> {
        let project = get_project(d, client)?;

        tracing::info!(name = d.id(), "Deleting snapshot");
        let op = match snapshots::delete_snapshot(client, &project, d.id()).await {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                tracing::warn!(name = d.id(), "Removing Snapshot because it's gone");
                d.set_id("");
                return Ok(());
            }
            Err(e) => return Err(ProviderError::api("Error deleting snapshot", e)),
        };

        compute_operation_wait(client, op, &project, "Deleting Snapshot")
            .await
            .map_err(|e| ProviderError::api("Error deleting snapshot", e))?;

        d.set_id("");
        Ok(())
    }

    async fn exists(&self, d: &mut ResourceData, client: &GoogleClient) -> ProviderResult<bool> {
        let project = get_project(d, client)?;

        match snapshots::get_snapshot(client, &project, d.id()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::warn!(name = d.id(), "Removing Snapshot because it's gone");
                d.set_id("");
                Ok(false)
            }
            Err(e) => Err(ProviderError::api(format!("Error reading Snapshot {:?}", d.id()), e)),
        }
    }
}
