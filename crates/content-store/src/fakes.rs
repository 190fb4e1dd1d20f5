//! In-memory fake for the storage trait (testing only)
//!
//! `MemoryContentStore` satisfies the `ContentStore` contract without
//! touching the filesystem.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory store backed by a `BTreeMap<(collection, id), document>`.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    docs: Mutex<BTreeMap<(String, String), StoredDocument>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(
        &self,
        collection: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> StorageResult<ContentDigest> {
        validate_id(collection)?;
        validate_id(id)?;
        let digest = ContentDigest::of_json(body)?;
        let doc = StoredDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            digest: digest.clone(),
            stored_at: Utc::now(),
            body: body.clone(),
        };
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), id.to_string()), doc);
        Ok(digest)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<StoredDocument> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn list(&self, collection: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, id)| id.clone())
            .collect())
    }
}
