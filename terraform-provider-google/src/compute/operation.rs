//! Waiting on Compute Engine operations
//!
//! Mutating calls return an [`Operation`] that runs in the background. It is
//! polled through the zonal, regional or global operations endpoint until
//! its status reaches `DONE`.

use super::types::Operation;
use crate::client::GoogleClient;
use crate::error::{GoogleError, GoogleResult};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4 * 60);
const DEFAULT_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Timing of the operation wait loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationWait {
    pub timeout: Duration,
    /// Pause before the first poll
    pub delay: Duration,
    /// Pause between polls
    pub poll_interval: Duration,
}

impl Default for OperationWait {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl OperationWait {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Where an operation is polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationScope {
    Zonal(String),
    Regional(String),
    Global,
}

impl OperationScope {
    /// Scope of `op`, from its zone or region URL.
    pub fn of(op: &Operation) -> Self {
        let last = |url: &str| url.rsplit('/').next().unwrap_or(url).to_string();

        match (op.zone.as_deref(), op.region.as_deref()) {
            (Some(zone), _) if !zone.is_empty() => OperationScope::Zonal(last(zone)),
            (_, Some(region)) if !region.is_empty() => OperationScope::Regional(last(region)),
            _ => OperationScope::Global,
        }
    }

    fn url(&self, client: &GoogleClient, project: &str, name: &str) -> String {
        let resource = format!("operations/{}", name);
        match self {
            OperationScope::Zonal(zone) => client.compute_zonal_url(project, zone, &resource),
            OperationScope::Regional(region) => {
                client.compute_regional_url(project, region, &resource)
            }
            OperationScope::Global => client.compute_global_url(project, &resource),
        }
    }
}

/// Wait for `op` with the client's wait settings.
pub async fn compute_operation_wait(
    client: &GoogleClient,
    op: Operation,
    project: &str,
    activity: &str,
) -> GoogleResult<()> {
    let wait = *client.operation_wait();
    compute_operation_wait_with(client, op, project, activity, wait).await
}

/// Poll `op` until it is done, then fail if it reported errors.
pub async fn compute_operation_wait_with(
    client: &GoogleClient,
    mut op: Operation,
    project: &str,
    activity: &str,
    wait: OperationWait,
) -> GoogleResult<()> {
    let scope = OperationScope::of(&op);
    let started = Instant::now();
    let timed_out = || GoogleError::Timeout {
        activity: activity.to_string(),
        timeout: wait.timeout,
    };

    if !op.is_done() {
        tracing::debug!(operation = %op.name, status = %op.status, "Waiting for {}", activity);
        sleep(wait.delay).await;
    }

    while !op.is_done() {
        let remaining = wait.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(timed_out());
        }

        // a stalled poll must not outlive the wait
        let url = scope.url(client, project, &op.name);
        op = timeout(remaining, client.get::<Operation>(&url))
            .await
            .map_err(|_| timed_out())??;

        match op.status.as_str() {
            "DONE" => break,
            "PENDING" | "RUNNING" => {
                tracing::debug!(operation = %op.name, status = %op.status, "Operation in progress");
                sleep(wait.poll_interval).await;
            }
            other => {
                tracing::warn!(operation = %op.name, status = other, "Unexpected operation status");
                sleep(wait.poll_interval).await;
            }
        }
    }

    let errors = op.error_messages();
    if !errors.is_empty() {
        return Err(GoogleError::Operation {
            activity: activity.to_string(),
            errors,
        });
    }

    tracing::debug!(operation = %op.name, "{} finished", activity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleProviderConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast() -> OperationWait {
        OperationWait::default()
            .with_delay(Duration::from_millis(1))
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_millis(500))
    }

    async fn client(server: &MockServer) -> GoogleClient {
        let settings = GoogleProviderConfig {
            access_token: Some("token".to_string()),
            compute_custom_endpoint: Some(format!("{}/compute/v1/", server.uri())),
            ..Default::default()
        };
        GoogleClient::new(&settings).await.unwrap()
    }

    fn op(value: serde_json::Value) -> Operation {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scope_from_urls() {
        let zonal = op(json!({"name": "a", "zone": "https://compute.googleapis.com/compute/v1/projects/p/zones/us-central1-a"}));
        let regional = op(json!({"name": "b", "region": "https://compute.googleapis.com/compute/v1/projects/p/regions/us-east1"}));
        let global = op(json!({"name": "c"}));

        assert_eq!(OperationScope::of(&zonal), OperationScope::Zonal("us-central1-a".to_string()));
        assert_eq!(OperationScope::of(&regional), OperationScope::Regional("us-east1".to_string()));
        assert_eq!(OperationScope::of(&global), OperationScope::Global);
    }

    #[tokio::test]
    async fn test_done_operation_returns_without_polling() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        compute_operation_wait_with(&client, op(json!({"name": "op", "status": "DONE"})), "p", "Creating Snapshot", fast())
            .await
            .unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_polls_zonal_endpoint_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/p/zones/us-central1-a/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-1", "status": "RUNNING"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/p/zones/us-central1-a/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-1", "status": "DONE"})))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let pending = op(json!({"name": "op-1", "status": "PENDING", "zone": "projects/p/zones/us-central1-a"}));
        compute_operation_wait_with(&client, pending, "p", "Creating Snapshot", fast())
            .await
            .unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_operation_errors_fail_the_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/p/global/operations/op-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-2",
                "status": "DONE",
                "error": {"errors": [{"code": "RESOURCE_NOT_READY", "message": "snapshot is not ready"}]}
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let err = compute_operation_wait_with(&client, op(json!({"name": "op-2", "status": "RUNNING"})), "p", "Deleting Snapshot", fast())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Error waiting for Deleting Snapshot: snapshot is not ready");
    }

    #[tokio::test]
    async fn test_timeout_names_activity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-3", "status": "RUNNING"})))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let wait = fast().with_timeout(Duration::from_millis(20)).with_poll_interval(Duration::from_millis(5));
        let err = compute_operation_wait_with(&client, op(json!({"name": "op-3", "status": "RUNNING"})), "p", "Setting labels on snapshot", wait)
            .await
            .unwrap_err();

        assert!(matches!(err, GoogleError::Timeout { .. }));
        assert!(err.to_string().contains("Setting labels on snapshot"));
    }

    #[tokio::test]
    async fn test_stalled_poll_is_bounded_by_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "op-4", "status": "DONE"}))
                    .set_delay(Duration::from_secs(20)),
            )
            .mount(&server)
            .await;

        let client = client(&server).await;
        let wait = fast().with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let running = op(json!({"name": "op-4", "status": "RUNNING"}));
        let err = compute_operation_wait_with(&client, running, "p", "Creating Snapshot", wait)
            .await
            .unwrap_err();

        assert!(matches!(err, GoogleError::Timeout { .. }), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
