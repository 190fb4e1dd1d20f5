//! Error types for content-store

use thiserror::Error;

/// Errors returned by [`ContentStore`](crate::ContentStore) implementations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Document not found
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Identifier unusable as a storage key
    #[error("invalid document id: {id:?}")]
    InvalidId { id: String },

    /// Invalid digest format
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
