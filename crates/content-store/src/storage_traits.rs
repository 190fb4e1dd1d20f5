//! Storage trait definitions for Hashwire content
//!
//! `ContentStore` persists JSON documents (content packages, run reports)
//! grouped in collections and keyed by id. Every stored document carries
//! the SHA-256 digest of its canonical JSON encoding.
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Digest of a JSON value's compact encoding.
    pub fn of_json(value: &serde_json::Value) -> StorageResult<Self> {
        Ok(Self::from_bytes(&serde_json::to_vec(value)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted document and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub collection: String,
    pub id: String,
    pub digest: ContentDigest,
    pub stored_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

/// Reject ids that cannot be used as a single path component.
pub fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId { id: id.to_string() })
    }
}

/// Document store for generated content.
///
/// Guarantees:
/// - `put` returns the digest of the stored body and replaces any previous
///   document with the same collection and id.
/// - `get` returns exactly what was last stored, or `StorageError::NotFound`.
/// - `list` returns ids in ascending order.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(
        &self,
        collection: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> StorageResult<ContentDigest>;

    async fn get(&self, collection: &str, id: &str) -> StorageResult<StoredDocument>;

    async fn list(&self, collection: &str) -> StorageResult<Vec<String>>;

    async fn contains(&self, collection: &str, id: &str) -> StorageResult<bool> {
        match self.get(collection, id).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
