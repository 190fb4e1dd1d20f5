//! Contract tests for `ContentStore`.
//!
//! Both the filesystem store and the in-memory fake must satisfy the same
//! behavior; each test runs against both.

use content_store::{ContentDigest, ContentStore, FsContentStore, MemoryContentStore, StorageError};
use serde_json::json;

fn stores() -> (tempfile::TempDir, Vec<Box<dyn ContentStore>>) {
    let dir = tempfile::tempdir().unwrap();
    let fs = FsContentStore::new(dir.path().join("store")).unwrap();
    (dir, vec![Box::new(fs), Box::new(MemoryContentStore::new())])
}

#[tokio::test]
async fn put_returns_digest_of_body() {
    let (_dir, stores) = stores();
    let body = json!({"topic": "difficulty adjustment", "words": 812});
    for store in stores {
        let digest = store.put("packages", "p1", &body).await.unwrap();
        assert_eq!(digest, ContentDigest::of_json(&body).unwrap());
    }
}

#[tokio::test]
async fn get_returns_last_put() {
    let (_dir, stores) = stores();
    for store in stores {
        store.put("packages", "p1", &json!({"rev": 1})).await.unwrap();
        store.put("packages", "p1", &json!({"rev": 2})).await.unwrap();
        let doc = store.get("packages", "p1").await.unwrap();
        assert_eq!(doc.collection, "packages");
        assert_eq!(doc.id, "p1");
        assert_eq!(doc.body, json!({"rev": 2}));
    }
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let (_dir, stores) = stores();
    for store in stores {
        let err = store.get("packages", "absent").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(!store.contains("packages", "absent").await.unwrap());
    }
}

#[tokio::test]
async fn list_sorted_per_collection() {
    let (_dir, stores) = stores();
    for store in stores {
        for id in ["c", "a", "b"] {
            store.put("packages", id, &json!(id)).await.unwrap();
        }
        store.put("runs", "r1", &json!({})).await.unwrap();
        assert_eq!(store.list("packages").await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.list("runs").await.unwrap(), vec!["r1"]);
        assert!(store.contains("runs", "r1").await.unwrap());
    }
}

#[tokio::test]
async fn invalid_ids_rejected() {
    let (_dir, stores) = stores();
    for store in stores {
        for bad in ["", "..", "a/b", "x y"] {
            let err = store.put("packages", bad, &json!({})).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidId { .. }), "{bad:?}");
        }
    }
}
