//! HTTP utilities for Google REST API calls

use crate::error::{GoogleApiError, GoogleError, GoogleResult};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Upper bound on a single API request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and strip control characters before logging it
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for Google API calls
#[derive(Clone)]
pub struct GoogleHttpClient {
    client: Client,
}

impl GoogleHttpClient {
    pub fn new() -> GoogleResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("terraform-provider-google/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> GoogleResult<T> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url).bearer_auth(token)).await
    }

    pub async fn post<B, T>(&self, url: &str, token: &str, body: &B) -> GoogleResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", url);
        self.send(self.client.post(url).bearer_auth(token).json(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str, token: &str) -> GoogleResult<T> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url).bearer_auth(token)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> GoogleResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(GoogleError::Api(GoogleApiError::from_response(
                status.as_u16(),
                &body,
            )));
        }

        let body = if body.trim().is_empty() { "null" } else { &body };
        Ok(serde_json::from_str(body)?)
    }
}
