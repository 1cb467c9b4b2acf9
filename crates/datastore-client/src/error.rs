//! Error types for Datastore access.

use thiserror::Error;

/// Errors returned by [`crate::DatastoreClient`] implementations.
#[derive(Error, Debug)]
pub enum DatastoreError {
    /// One or more entities did not exist. Deletes treat this as success.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Throttling or a temporary server-side failure. Safe to retry.
    #[error("Transient Datastore failure (status {status}): {message}")]
    Transient { status: u16, message: String },

    /// The request was rejected for a non-retryable reason.
    #[error("Datastore rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// A delete call carried more keys than a single commit accepts.
    #[error("Delete batch of {len} keys exceeds the per-commit limit of {limit}")]
    BatchTooLarge { len: usize, limit: usize },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("Failed to decode Datastore response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A client could not be built from the supplied credentials.
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl DatastoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether a caller could reasonably retry the same request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            429 | 500 | 502 | 503 | 504 => Self::Transient { status, message },
            _ => Self::Rejected { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(DatastoreError::from_status(404, "gone").is_not_found());
        assert!(DatastoreError::from_status(429, "slow down").is_transient());
        assert!(DatastoreError::from_status(503, "unavailable").is_transient());

        let rejected = DatastoreError::from_status(400, "bad key");
        assert!(!rejected.is_transient());
        assert!(!rejected.is_not_found());
        assert_eq!(
            rejected.to_string(),
            "Datastore rejected request (status 400): bad key"
        );
    }
}
