//! Filesystem-backed content store.
//!
//! Layout: `<root>/<collection>/<id>.json`, one `StoredDocument` per file.
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers never observe a partial document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root.join(collection).join(format!("{id}.json"))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StorageError::InvalidId {
            id: path.display().to_string(),
        })?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ContentStore for FsContentStore {
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
        let bytes = serde_json::to_vec_pretty(&doc)?;
        let path = self.doc_path(collection, id);

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))??;

        debug!(collection, id, digest = digest.short(), "document stored");
        Ok(digest)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<StoredDocument> {
        validate_id(collection)?;
        validate_id(id)?;
        let path = self.doc_path(collection, id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn list(&self, collection: &str) -> StorageResult<Vec<String>> {
        validate_id(collection)?;
        let dir = self.root.join(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_store() -> (tempfile::TempDir, FsContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn document_roundtrip() {
        let (_dir, store) = make_store();
        let body = json!({"title": "Hashrate climbs", "variants": {"x": "short"}});
        let digest = store.put("packages", "pkg-1", &body).await.unwrap();

        let doc = store.get("packages", "pkg-1").await.unwrap();
        assert_eq!(doc.body, body);
        assert_eq!(doc.digest, digest);
        assert_eq!(digest, ContentDigest::of_json(&body).unwrap());
    }

    #[tokio::test]
    async fn put_replaces_previous_document() {
        let (_dir, store) = make_store();
        store.put("packages", "pkg-1", &json!({"v": 1})).await.unwrap();
        store.put("packages", "pkg-1", &json!({"v": 2})).await.unwrap();
        let doc = store.get("packages", "pkg-1").await.unwrap();
        assert_eq!(doc.body, json!({"v": 2}));
        assert_eq!(store.list("packages").await.unwrap(), vec!["pkg-1"]);
    }

    #[tokio::test]
    async fn list_is_sorted_and_scoped() {
        let (_dir, store) = make_store();
        store.put("packages", "b", &json!(1)).await.unwrap();
        store.put("packages", "a", &json!(2)).await.unwrap();
        store.put("runs", "r1", &json!(3)).await.unwrap();
        assert_eq!(store.list("packages").await.unwrap(), vec!["a", "b"]);
        assert!(store.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_nonexistent_returns_not_found() {
        let (_dir, store) = make_store();
        let err = store.get("packages", "nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(!store.contains("packages", "nope").await.unwrap());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let (_dir, store) = make_store();
        let err = store.put("packages", "../escape", &json!({})).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId { .. }));
    }
}
