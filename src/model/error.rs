use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("bucket does not exist: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("object does not exist: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("failed to access local file: {}, {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create client: {0}")]
    Client(String),

    #[error("failed to {operation} at: {target}, {message}")]
    Backend {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("{operation} exceeded its deadline")]
    DeadlineExceeded { operation: &'static str },

    #[error("failed to parse provider of: {0}")]
    InvalidUri(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::BucketNotFound { .. } | StorageError::ObjectNotFound { .. }
        )
    }

    pub(crate) fn backend(operation: &'static str, target: &str, err: impl ToString) -> Self {
        StorageError::Backend {
            operation,
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn bucket_not_found(bucket: &str) -> Self {
        StorageError::BucketNotFound {
            bucket: bucket.to_string(),
        }
    }

    pub(crate) fn object_not_found(bucket: &str, key: &str) -> Self {
        StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}
