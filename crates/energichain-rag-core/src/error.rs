//! Errors raised at the external-service boundary.
//!
//! Providers wrap their failures in [`ServiceError`] so callers (the HTTP
//! layer in particular) can tell service failures apart from validation or
//! internal errors by downcasting an `anyhow::Error`.

/// Failure of the embedding or completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The embedding service returned an error or an unusable response.
    Embedding(String),
    /// The completion service returned an error or an unusable response.
    Completion(String),
    /// A call exceeded its per-call timeout on every attempt.
    Timeout(String),
    /// No completion provider is configured.
    CompletionDisabled,
}

impl ServiceError {
    /// Wrap a transport error, classifying timeouts separately.
    pub fn from_transport(embedding: bool, timed_out: bool, message: String) -> Self {
        if timed_out {
            ServiceError::Timeout(message)
        } else if embedding {
            ServiceError::Embedding(message)
        } else {
            ServiceError::Completion(message)
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Embedding(e) => write!(f, "embedding service failed: {}", e),
            ServiceError::Completion(e) => write!(f, "completion service failed: {}", e),
            ServiceError::Timeout(e) => write!(f, "service call timed out: {}", e),
            ServiceError::CompletionDisabled => {
                write!(f, "completion provider is disabled")
            }
        }
    }
}

impl std::error::Error for ServiceError {}
