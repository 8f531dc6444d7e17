use std::{error::Error, fmt};

use crate::history::HistoryError;

#[derive(Debug)]
pub enum ObjectStorageError {
    BucketMissing,
    S3Error(Box<dyn Error + Send + Sync + 'static>),
    EnvError(std::env::VarError),
    BodyError(String),
    DocumentError(serde_json::Error),
}

impl std::error::Error for ObjectStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use ObjectStorageError::*;
        match self {
            S3Error(e) => Some(e.as_ref() as &dyn Error),
            EnvError(e) => Some(e),
            DocumentError(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectStorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ObjectStorageError::*;
        match self {
            BucketMissing => write!(f, "BucketMissing"),
            S3Error(e) => write!(f, "S3Error: {}", e),
            EnvError(e) => write!(f, "EnvError: {}", e),
            BodyError(s) => write!(f, "BodyError: {}", s),
            DocumentError(e) => write!(f, "DocumentError: {}", e),
        }
    }
}

impl From<std::env::VarError> for ObjectStorageError {
    fn from(error: std::env::VarError) -> Self {
        ObjectStorageError::EnvError(error)
    }
}

impl From<serde_json::Error> for ObjectStorageError {
    fn from(error: serde_json::Error) -> Self {
        ObjectStorageError::DocumentError(error)
    }
}

/// Failure of a user-facing library operation.
#[derive(Debug, thiserror::Error)]
pub enum LibrarianError {
    #[error("library document unavailable: {0:#}")]
    Persistence(anyhow::Error),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("cover upload failed: {0:#}")]
    Cover(anyhow::Error),
    #[error("{0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_includes_cause_chain() {
        let cause = anyhow::anyhow!("disk full").context("write library_document");
        let err = LibrarianError::Persistence(cause);
        assert_eq!(
            err.to_string(),
            "library document unavailable: write library_document: disk full"
        );
    }

    #[test]
    fn test_object_storage_error_display() {
        let err = ObjectStorageError::BodyError("stream closed".to_string());
        assert_eq!(err.to_string(), "BodyError: stream closed");
    }
}
