use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use content_store::ContentStore;
use tracing::debug;

use crate::package::{ContentPackage, PackageStatus};
use crate::stage::{Stage, StageFailed, StageKind};

pub const PACKAGES_COLLECTION: &str = "packages";

/// Hands assembled packages to the persistence layer.
pub struct Publisher {
    store: Arc<dyn ContentStore>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage<ContentPackage, ContentPackage> for Publisher {
    fn kind(&self) -> StageKind {
        StageKind::Publisher
    }

    async fn run(&self, mut package: ContentPackage) -> Result<ContentPackage, StageFailed> {
        let topic_id = package.topic_id;
        let fail = move |reason: String| StageFailed::new(StageKind::Publisher, topic_id, reason);

        package.status = PackageStatus::Published;
        package.updated_at = Utc::now();
        let body = serde_json::to_value(&package).map_err(|e| fail(e.to_string()))?;
        let digest = self
            .store
            .put(PACKAGES_COLLECTION, &package.id.to_string(), &body)
            .await
            .map_err(|e| fail(e.to_string()))?;
        debug!(package_id = %package.id, digest = digest.short(), "package published");
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Draft, Platform, PlatformVariant, ResearchBrief, ReviewedDraft};
    use crate::topic::{Topic, TopicCategory};
    use content_store::{FsContentStore, MemoryContentStore};
    use hashwire_core::{DataSnapshot, SustainabilitySnapshot, TrendSnapshot};
    use std::collections::BTreeMap;

    fn package() -> ContentPackage {
        let snapshot = Arc::new(DataSnapshot {
            on_chain: BTreeMap::new(),
            sustainability: SustainabilitySnapshot::default(),
            trends: TrendSnapshot::default(),
            timestamp: Utc::now(),
        });
        let reviewed = ReviewedDraft {
            draft: Draft {
                brief: ResearchBrief {
                    topic: Topic::new("Fees", "", snapshot, TopicCategory::NetworkActivity),
                    facts: vec![],
                    needs_evidence: vec![],
                    context: vec![],
                    sources: vec![],
                },
                title: "Fees".to_string(),
                body: "Body".to_string(),
            },
            word_count: 1,
            reading_minutes: 1,
        };
        ContentPackage::assemble(
            &reviewed,
            vec![PlatformVariant {
                platform: Platform::X,
                text: "Fees".to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn test_publish_stores_package() {
        let store = Arc::new(MemoryContentStore::new());
        let pkg = package();
        let published = Publisher::new(store.clone()).run(pkg.clone()).await.unwrap();
        assert_eq!(published.status, PackageStatus::Published);

        let doc = store
            .get(PACKAGES_COLLECTION, &pkg.id.to_string())
            .await
            .unwrap();
        let stored: ContentPackage = serde_json::from_value(doc.body).unwrap();
        assert_eq!(stored, published);
        assert!(stored.verify_digest());
    }

    #[tokio::test]
    async fn test_publish_to_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsContentStore::new(dir.path()).unwrap());
        let pkg = package();
        Publisher::new(store.clone()).run(pkg.clone()).await.unwrap();
        assert_eq!(
            store.list(PACKAGES_COLLECTION).await.unwrap(),
            vec![pkg.id.to_string()]
        );
    }
}
