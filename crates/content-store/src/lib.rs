//! Content-Store: persistence for generated Hashwire content
//!
//! Stores content packages as JSON documents, each tagged
//! with the SHA-256 digest of its body.
//!
//! ## Key Components
//!
//! - `ContentStore`: async, backend-agnostic document store trait
//! - `FsContentStore`: one JSON file per document, atomic writes
//! - `MemoryContentStore`: in-memory fake for tests

mod error;
pub mod fakes;
pub mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::MemoryContentStore;
pub use fs::FsContentStore;
pub use storage_traits::{validate_id, ContentDigest, ContentStore, StorageResult, StoredDocument};
