//! Snapshot endpoints of the Compute Engine API

use super::types::{GlobalSetLabelsRequest, Operation, Snapshot};
use crate::client::GoogleClient;
use crate::error::GoogleResult;
use std::collections::BTreeMap;

pub async fn get_snapshot(
    client: &GoogleClient,
    project: &str,
    name: &str,
) -> GoogleResult<Snapshot> {
    let url = client.compute_global_url(project, &format!("snapshots/{}", name));
    client.get(&url).await
}

/// `disks.createSnapshot` on the zonal disk `disk`
pub async fn create_snapshot(
    client: &GoogleClient,
    project: &str,
    zone: &str,
    disk: &str,
    snapshot: &Snapshot,
) -> GoogleResult<Operation> {
    let url = client.compute_zonal_url(project, zone, &format!("disks/{}/createSnapshot", disk));
    client.post(&url, snapshot).await
}

pub async fn delete_snapshot(
    client: &GoogleClient,
    project: &str,
    name: &str,
) -> GoogleResult<Operation> {
    let url = client.compute_global_url(project, &format!("snapshots/{}", name));
    client.delete(&url).await
}

/// Replace the labels of a snapshot; `fingerprint` must match the current one.
pub async fn set_snapshot_labels(
    client: &GoogleClient,
    project: &str,
    name: &str,
    labels: BTreeMap<String, String>,
    fingerprint: &str,
) -> GoogleResult<Operation> {
    let url = client.compute_global_url(project, &format!("snapshots/{}/setLabels", name));
    let request = GlobalSetLabelsRequest {
        labels,
        label_fingerprint: fingerprint.to_string(),
    };
    client.post(&url, &request).await
}
