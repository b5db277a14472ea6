//! Kubernetes error types

use thiserror::Error;

/// Kubernetes-specific errors
#[derive(Debug, Error)]
pub enum K8sError {
    /// Error from kube-rs client
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Invalid kubeconfig
    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// Kubeconfig file could not be read
    #[error("Failed to read kubeconfig {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl K8sError {
    /// Whether the API server answered 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// HTTP status of an API error response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            K8sError::KubeError(kube::Error::Api(response)) => Some(response.code),
            _ => None,
        }
    }
}

/// Result type alias for Kubernetes operations
pub type K8sResult<T> = std::result::Result<T, K8sError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> K8sError {
        K8sError::KubeError(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("rolebindings \"rb\" {}", reason),
            reason: reason.to_string(),
            code,
        }))
    }

    #[test]
    fn test_not_found_detection() {
        assert!(api_error(404, "NotFound").is_not_found());
        assert!(!api_error(409, "AlreadyExists").is_not_found());
        assert_eq!(api_error(409, "AlreadyExists").status_code(), Some(409));
        assert!(!K8sError::InvalidKubeconfig("bad".into()).is_not_found());
    }
}
