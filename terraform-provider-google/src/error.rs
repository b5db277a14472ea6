//! Google API error types

use serde::Deserialize;
use thiserror::Error;

/// Errors from the Google Cloud REST layer
#[derive(Debug, Error)]
pub enum GoogleError {
    /// The API answered with a non-2xx status
    #[error("{0}")]
    Api(GoogleApiError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    /// A long-running operation finished with errors
    #[error("Error waiting for {activity}: {}", .errors.join(", "))]
    Operation { activity: String, errors: Vec<String> },

    #[error("Timeout waiting for {activity} after {timeout:?}")]
    Timeout {
        activity: String,
        timeout: std::time::Duration,
    },
}

impl GoogleError {
    /// Whether the API answered 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            GoogleError::Api(e) => Some(e.code),
            _ => None,
        }
    }
}

/// Decoded `{"error": {...}}` envelope
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleApiError {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorItem {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Deserialize)]
struct Envelope {
    error: GoogleApiError,
}

impl GoogleApiError {
    /// Decode an error body; bodies without the envelope keep `status` and
    /// the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => GoogleApiError {
                code: status,
                message: body.trim().to_string(),
                errors: Vec::new(),
            },
        }
    }
}

impl std::fmt::Display for GoogleApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "googleapi: Error {}: {}", self.code, self.message)?;
        for item in &self.errors {
            if !item.reason.is_empty() {
                write!(f, ", {}", item.reason)?;
            }
        }
        Ok(())
    }
}

pub type GoogleResult<T> = std::result::Result<T, GoogleError>;
