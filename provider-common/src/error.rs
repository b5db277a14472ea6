//! Provider errors
//!
//! Backend crates convert their API errors into [`ProviderError`] with the
//! operation that failed as context; the dispatcher turns them into
//! diagnostics at the protocol boundary.

use crate::protocol::Diagnostic;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured")]
    NotConfigured,

    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    #[error("Unexpected ID format ({id:?}), expected {expected}")]
    InvalidId { id: String, expected: String },

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// A vendor API call failed.
    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn api(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Api {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn invalid_id(id: &str, expected: &str) -> Self {
        Self::InvalidId {
            id: id.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::error(&err.to_string())
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
