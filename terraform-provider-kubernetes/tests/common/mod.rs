//! Common test utilities for provider tests
//!
//! A stateful stand-in for the namespaced RBAC endpoints of the Kubernetes
//! API server, mounted on a wiremock server.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Default)]
struct ApiState {
    objects: HashMap<String, Value>,
    next_version: u64,
    fail_with: Option<u16>,
    requests: Vec<String>,
}

/// In-memory RBAC API: `POST`, `GET`, `PUT` and `DELETE` on
/// `/apis/rbac.authorization.k8s.io/v1/namespaces/{ns}/{plural}[/{name}]`
#[derive(Clone, Default)]
pub struct FakeRbacApi {
    state: Arc<Mutex<ApiState>>,
}

fn status(code: u16, reason: &str, message: String) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    }))
}

fn key(plural: &str, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", plural, namespace, name)
}

impl FakeRbacApi {
    pub fn object(&self, plural: &str, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&key(plural, namespace, name))
            .cloned()
    }

    pub fn remove(&self, plural: &str, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .objects
            .remove(&key(plural, namespace, name));
    }

    pub fn edit(&self, plural: &str, namespace: &str, name: &str, f: impl FnOnce(&mut Value)) {
        let mut state = self.state.lock().unwrap();
        if let Some(object) = state.objects.get_mut(&key(plural, namespace, name)) {
            f(object);
        }
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
        self.state.lock().unwrap().objects.is_empty()
    }
}

impl Respond for FakeRbacApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let path = request.url.path().to_string();
        let method = request.method.as_str().to_string();
        state.requests.push(format!("{} {}", method, path));

        if let Some(code) = state.fail_with {
            return status(code, "InternalError", "injected failure".to_string());
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let (namespace, plural, name) = match segments.as_slice() {
            ["apis", _, _, "namespaces", ns, plural] => (*ns, *plural, None),
            ["apis", _, _, "namespaces", ns, plural, name] => (*ns, *plural, Some(*name)),
            _ => return status(404, "NotFound", format!("no route for {}", path)),
        };
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        match (method.as_str(), name) {
            ("POST", None) => {
                let Some(name) = body["metadata"]["name"].as_str().map(String::from) else {
                    return status(422, "Invalid", "metadata.name is required".to_string());
                };
                let k = key(plural, namespace, &name);
                if state.objects.contains_key(&k) {
                    return status(409, "AlreadyExists", format!("{} \"{}\" already exists", plural, name));
                }

                state.next_version += 1;
                let version = state.next_version;
                let mut object = body;
                object["metadata"]["namespace"] = json!(namespace);
                object["metadata"]["resourceVersion"] = json!(version.to_string());
                object["metadata"]["uid"] = json!(format!("uid-{}", version));
                object["metadata"]["generation"] = json!(1);
                object["metadata"]["creationTimestamp"] = json!("2024-01-01T00:00:00Z");
                state.objects.insert(k, object.clone());
                ResponseTemplate::new(201).set_body_json(object)
            }
            ("GET", Some(name)) => match state.objects.get(&key(plural, namespace, name)) {
                Some(object) => ResponseTemplate::new(200).set_body_json(object.clone()),
                None => status(404, "NotFound", format!("{} \"{}\" not found", plural, name)),
            },
            ("PUT", Some(name)) => {
                let k = key(plural, namespace, name);
                let Some(stored) = state.objects.get(&k).cloned() else {
                    return status(404, "NotFound", format!("{} \"{}\" not found", plural, name));
                };
                if body["metadata"]["resourceVersion"] != stored["metadata"]["resourceVersion"] {
                    return status(
                        409,
                        "Conflict",
                        "the object has been modified; please apply your changes to the latest version".to_string(),
                    );
                }

                state.next_version += 1;
                let version = state.next_version;
                let mut object = body;
                object["metadata"]["resourceVersion"] = json!(version.to_string());
                object["metadata"]["uid"] = stored["metadata"]["uid"].clone();
                object["metadata"]["creationTimestamp"] = stored["metadata"]["creationTimestamp"].clone();
                state.objects.insert(k, object.clone());
                ResponseTemplate::new(200).set_body_json(object)
            }
            ("DELETE", Some(name)) => match state.objects.remove(&key(plural, namespace, name)) {
                Some(object) => ResponseTemplate::new(200).set_body_json(object),
                None => status(404, "NotFound", format!("{} \"{}\" not found", plural, name)),
            },
            _ => status(405, "MethodNotAllowed", format!("{} {}", method, path)),
        }
    }
}

/// Start a mock API server backed by a fresh [`FakeRbacApi`].
pub async fn start_fake_api() -> (MockServer, FakeRbacApi) {
    let server = MockServer::start().await;
    let api = FakeRbacApi::default();

    Mock::given(path_regex(r"^/apis/rbac\.authorization\.k8s\.io/v1/namespaces/"))
        .respond_with(api.clone())
        .mount(&server)
        .await;

    (server, api)
}

/// Provider block pointing at `server` without touching any kubeconfig.
pub fn provider_config(server: &MockServer) -> Value {
    json!({
        "host": server.uri(),
        "load_config_file": false
    })
}
