//! Error types for the object store

use thiserror::Error;

/// Errors that can occur talking to the object store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Object not found: {bucket}/{id}")]
    NotFound { bucket: String, id: String },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(bucket: &str, id: &str) -> Self {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            id: id.to_string(),
        }
    }
}
