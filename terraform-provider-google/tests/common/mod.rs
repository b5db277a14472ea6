//! Common test utilities for provider tests
//!
//! A stateful stand-in for the snapshot and operation endpoints of the
//! Compute Engine API, mounted on a wiremock server.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use terraform_provider_google::compute::OperationWait;
use terraform_provider_google::config::GoogleProviderConfig;
use terraform_provider_google::GoogleClient;
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "test-token";
pub const PROJECT: &str = "test-project";
pub const ZONE: &str = "us-central1-a";

#[derive(Default)]
struct ApiState {
    base: String,
    snapshots: HashMap<String, Value>,
    operations: HashMap<String, Value>,
    /// Polls left before an operation reports DONE
    remaining_polls: HashMap<String, u32>,
    pending_polls: u32,
    next_id: u64,
    operation_error: Option<String>,
    fail_with: Option<u16>,
    requests: Vec<String>,
}

/// In-memory Compute API: `disks.createSnapshot`, `snapshots.get`,
/// `snapshots.delete`, `snapshots.setLabels` and `*Operations.get`
#[derive(Clone, Default)]
pub struct FakeComputeApi {
    state: Arc<Mutex<ApiState>>,
}

fn api_error(code: u16, reason: &str, message: String) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"domain": "global", "reason": reason, "message": message}]
        }
    }))
}

fn fake_sha256(raw_key: &str) -> String {
    format!("sha256-of-{}", raw_key.len())
}

impl ApiState {
    fn project_url(&self, project: &str) -> String {
        format!("{}/compute/v1/projects/{}", self.base, project)
    }

    /// Record an operation for a mutation the caller applies itself.
    fn operation(&mut self, project: &str, zone: Option<&str>, kind: &str, target: String) -> Value {
        self.next_id += 1;
        let name = format!("operation-{}", self.next_id);
        let scope = match zone {
            Some(zone) => format!("zones/{}", zone),
            None => "global".to_string(),
        };

        let mut op = json!({
            "kind": "compute#operation",
            "name": name,
            "operationType": kind,
            "targetLink": target,
            "status": if self.pending_polls == 0 { "DONE" } else { "RUNNING" },
            "selfLink": format!("{}/{}/operations/{}", self.project_url(project), scope, name),
        });
        if let Some(zone) = zone {
            op["zone"] = json!(format!("{}/zones/{}", self.project_url(project), zone));
        }
        if let Some(message) = &self.operation_error {
            op["status"] = json!("DONE");
            op["error"] = json!({"errors": [{"code": "OPERATION_FAILED", "message": message}]});
        }

        self.remaining_polls.insert(name.clone(), self.pending_polls);
        self.operations.insert(name, op.clone());
        op
    }

    fn poll(&mut self, name: &str) -> Option<Value> {
        let remaining = self.remaining_polls.get_mut(name)?;
        *remaining = remaining.saturating_sub(1);
        let done = *remaining == 0;

        let op = self.operations.get_mut(name)?;
        if done {
            op["status"] = json!("DONE");
        }
        Some(op.clone())
    }

    fn bump_fingerprint(&mut self) -> String {
        self.next_id += 1;
        format!("fp-{}", self.next_id)
    }
}

impl FakeComputeApi {
    pub fn snapshot(&self, name: &str) -> Option<Value> {
        self.state.lock().unwrap().snapshots.get(name).cloned()
    }

    pub fn remove_snapshot(&self, name: &str) {
        self.state.lock().unwrap().snapshots.remove(name);
    }

    /// Change labels behind the provider's back, bumping the fingerprint.
    pub fn relabel(&self, name: &str, labels: Value) {
        let mut state = self.state.lock().unwrap();
        let fingerprint = state.bump_fingerprint();
        if let Some(snapshot) = state.snapshots.get_mut(name) {
            snapshot["labels"] = labels;
            snapshot["labelFingerprint"] = json!(fingerprint);
        }
    }

    /// New operations report RUNNING for `polls` polls.
    pub fn set_pending_polls(&self, polls: u32) {
        self.state.lock().unwrap().pending_polls = polls;
    }

    /// New operations finish DONE with this error and change nothing.
    pub fn fail_operations(&self, message: Option<&str>) {
        self.state.lock().unwrap().operation_error = message.map(String::from);
    }

    /// Answer every request with `code` until cleared.
    pub fn fail_with(&self, code: Option<u16>) {
        self.state.lock().unwrap().fail_with = code;
    }

    /// `METHOD path` of every request seen so far
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().snapshots.is_empty()
    }
}

impl Respond for FakeComputeApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let path = request.url.path().to_string();
        let method = request.method.as_str().to_string();
        state.requests.push(format!("{} {}", method, path));

        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false);
        if !authorized {
            return api_error(401, "authError", "Invalid Credentials".to_string());
        }
        if let Some(code) = state.fail_with {
            return api_error(code, "backendError", "injected failure".to_string());
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let ["compute", "v1", "projects", project, rest @ ..] = segments.as_slice() else {
            return api_error(404, "notFound", format!("no route for {}", path));
        };
        let project = *project;
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        match (method.as_str(), rest) {
            ("POST", ["zones", zone, "disks", disk, "createSnapshot"]) => {
                let Some(name) = body["name"].as_str().map(String::from) else {
                    return api_error(400, "required", "Required field 'name' not specified".to_string());
                };
                if state.snapshots.contains_key(&name) {
                    return api_error(
                        409,
                        "alreadyExists",
                        format!("The resource 'projects/{}/global/snapshots/{}' already exists", project, name),
                    );
                }

                let self_link = format!("{}/global/snapshots/{}", state.project_url(project), name);
                let op = state.operation(project, Some(*zone), "createSnapshot", self_link.clone());
                if state.operation_error.is_none() {
                    let fingerprint = state.bump_fingerprint();
                    let mut snapshot = json!({
                        "kind": "compute#snapshot",
                        "id": state.next_id.to_string(),
                        "name": name,
                        "selfLink": self_link,
                        "sourceDisk": format!("{}/zones/{}/disks/{}", state.project_url(project), zone, disk),
                        "status": "READY",
                        "labelFingerprint": fingerprint,
                    });
                    for key in ["snapshotEncryptionKey", "sourceDiskEncryptionKey"] {
                        if let Some(raw) = body[key]["rawKey"].as_str() {
                            snapshot[key] = json!({"sha256": fake_sha256(raw)});
                        }
                    }
                    state.snapshots.insert(name, snapshot);
                }
                ResponseTemplate::new(200).set_body_json(op)
            }
            ("GET", ["global", "snapshots", name]) => match state.snapshots.get(*name) {
                Some(snapshot) => ResponseTemplate::new(200).set_body_json(snapshot.clone()),
                None => api_error(
                    404,
                    "notFound",
                    format!("The resource 'projects/{}/global/snapshots/{}' was not found", project, name),
                ),
            },
            ("DELETE", ["global", "snapshots", name]) => {
                if !state.snapshots.contains_key(*name) {
                    return api_error(
                        404,
                        "notFound",
                        format!("The resource 'projects/{}/global/snapshots/{}' was not found", project, name),
                    );
                }
                let target = format!("{}/global/snapshots/{}", state.project_url(project), name);
                let op = state.operation(project, None, "delete", target);
                if state.operation_error.is_none() {
                    state.snapshots.remove(*name);
                }
                ResponseTemplate::new(200).set_body_json(op)
            }
            ("POST", ["global", "snapshots", name, "setLabels"]) => {
                let Some(current) = state.snapshots.get(*name).cloned() else {
                    return api_error(
                        404,
                        "notFound",
                        format!("The resource 'projects/{}/global/snapshots/{}' was not found", project, name),
                    );
                };
                if body["labelFingerprint"] != current["labelFingerprint"] {
                    return api_error(
                        412,
                        "conditionNotMet",
                        "Labels fingerprint either invalid or resource labels have changed".to_string(),
                    );
                }

                let target = format!("{}/global/snapshots/{}", state.project_url(project), name);
                let op = state.operation(project, None, "setLabels", target);
                if state.operation_error.is_none() {
                    let fingerprint = state.bump_fingerprint();
                    if let Some(snapshot) = state.snapshots.get_mut(*name) {
                        let labels = body["labels"].as_object().cloned().unwrap_or_default();
                        if labels.is_empty() {
                            if let Some(fields) = snapshot.as_object_mut() {
                                fields.remove("labels");
                            }
                        } else {
                            snapshot["labels"] = Value::Object(labels);
                        }
                        snapshot["labelFingerprint"] = json!(fingerprint);
                    }
                }
                ResponseTemplate::new(200).set_body_json(op)
            }
            ("GET", ["zones", _, "operations", name]) | ("GET", ["global", "operations", name]) => {
                match state.poll(name) {
                    Some(op) => ResponseTemplate::new(200).set_body_json(op),
                    None => api_error(404, "notFound", format!("operation {} not found", name)),
                }
            }
            _ => api_error(405, "methodNotAllowed", format!("{} {}", method, path)),
        }
    }
}

/// Start a mock Compute API backed by a fresh [`FakeComputeApi`].
pub async fn start_fake_api() -> (MockServer, FakeComputeApi) {
    let server = MockServer::start().await;
    let api = FakeComputeApi::default();
    api.state.lock().unwrap().base = server.uri();

    Mock::given(path_regex(r"^/compute/v1/projects/"))
        .respond_with(api.clone())
        .mount(&server)
        .await;

    (server, api)
}

/// Provider block pointing at `server` with a static token.
pub fn provider_config(server: &MockServer) -> Value {
    json!({
        "access_token": TOKEN,
        "project": PROJECT,
        "compute_custom_endpoint": format!("{}/compute/v1/", server.uri())
    })
}

/// Client for `server` that polls operations without long pauses.
pub async fn client_for(server: &MockServer) -> GoogleClient {
    let settings = GoogleProviderConfig {
        access_token: Some(TOKEN.to_string()),
        project: Some(PROJECT.to_string()),
        compute_custom_endpoint: Some(format!("{}/compute/v1/", server.uri())),
        ..Default::default()
    };
    GoogleClient::new(&settings)
        .await
        .unwrap()
        .with_operation_wait(
            OperationWait::default()
                .with_delay(Duration::from_millis(1))
                .with_poll_interval(Duration::from_millis(1))
                .with_timeout(Duration::from_secs(5)),
        )
}
