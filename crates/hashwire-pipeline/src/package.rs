//! Intermediate stage outputs and the assembled content package.

use chrono::{DateTime, Utc};
use content_store::ContentDigest;
use hashwire_core::{EvidenceSource, MetricKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::topic::Topic;

/// Researcher output: verified facts and the gaps that must not be filled with numbers.
#[derive(Debug, Clone)]
pub struct ResearchBrief {
    pub topic: Topic,
    pub facts: Vec<String>,
    /// Focus metrics without a known value.
    pub needs_evidence: Vec<MetricKind>,
    pub context: Vec<String>,
    pub sources: Vec<EvidenceSource>,
}

#[derive(Debug, Clone)]
pub struct Draft {
    pub brief: ResearchBrief,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ReviewedDraft {
    pub draft: Draft,
    pub word_count: usize,
    pub reading_minutes: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    X,
    LinkedIn,
    Newsletter,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::X, Platform::LinkedIn, Platform::Newsletter];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::LinkedIn => "linkedin",
            Platform::Newsletter => "newsletter",
        }
    }

    /// Maximum length in characters, if the platform has one.
    pub fn char_limit(&self) -> Option<usize> {
        match self {
            Platform::X => Some(280),
            Platform::LinkedIn => Some(3000),
            Platform::Newsletter => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformVariant {
    pub platform: Platform,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Assembled,
    Published,
}

/// Everything produced for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPackage {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    pub long_form: String,
    pub platform_variants: Vec<PlatformVariant>,
    pub keywords: Vec<String>,
    pub sources: Vec<EvidenceSource>,
    pub status: PackageStatus,
    /// SHA-256 over the long form and every variant.
    pub content_digest: ContentDigest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentPackage {
    pub fn assemble(reviewed: &ReviewedDraft, platform_variants: Vec<PlatformVariant>) -> Self {
        let draft = &reviewed.draft;
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic_id: draft.brief.topic.id,
            title: draft.title.clone(),
            content_digest: content_digest(&draft.body, &platform_variants),
            long_form: draft.body.clone(),
            platform_variants,
            keywords: draft.brief.topic.keywords.clone(),
            sources: draft.brief.sources.clone(),
            status: PackageStatus::Assembled,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn variant(&self, platform: Platform) -> Option<&PlatformVariant> {
        self.platform_variants.iter().find(|v| v.platform == platform)
    }

    /// Recompute the digest and compare with the recorded one.
    pub fn verify_digest(&self) -> bool {
        content_digest(&self.long_form, &self.platform_variants) == self.content_digest
    }
}

fn content_digest(long_form: &str, variants: &[PlatformVariant]) -> ContentDigest {
    let mut buf = long_form.as_bytes().to_vec();
    for variant in variants {
        buf.push(0);
        buf.extend_from_slice(variant.platform.name().as_bytes());
        buf.push(0);
        buf.extend_from_slice(variant.text.as_bytes());
    }
    ContentDigest::from_bytes(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::TopicCategory;
    use chrono::Utc;
    use hashwire_core::{DataSnapshot, SustainabilitySnapshot, TrendSnapshot};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn reviewed() -> ReviewedDraft {
        let snapshot = Arc::new(DataSnapshot {
            on_chain: BTreeMap::new(),
            sustainability: SustainabilitySnapshot::default(),
            trends: TrendSnapshot::default(),
            timestamp: Utc::now(),
        });
        let topic = Topic::new("Fees", "Fee market", snapshot, TopicCategory::NetworkActivity)
            .with_keywords(vec!["fees".to_string()]);
        ReviewedDraft {
            draft: Draft {
                brief: ResearchBrief {
                    topic,
                    facts: vec![],
                    needs_evidence: vec![],
                    context: vec![],
                    sources: vec![],
                },
                title: "Fees are back".to_string(),
                body: "Block space is scarce again.".to_string(),
            },
            word_count: 5,
            reading_minutes: 1,
        }
    }

    fn variants() -> Vec<PlatformVariant> {
        vec![PlatformVariant {
            platform: Platform::X,
            text: "Fees are back".to_string(),
        }]
    }

    #[test]
    fn test_assemble_links_topic() {
        let reviewed = reviewed();
        let pkg = ContentPackage::assemble(&reviewed, variants());
        assert_eq!(pkg.topic_id, reviewed.draft.brief.topic.id);
        assert_eq!(pkg.status, PackageStatus::Assembled);
        assert_eq!(pkg.keywords, vec!["fees"]);
        assert!(pkg.variant(Platform::X).is_some());
        assert!(pkg.variant(Platform::LinkedIn).is_none());
    }

    #[test]
    fn test_digest_covers_variants() {
        let reviewed = reviewed();
        let mut pkg = ContentPackage::assemble(&reviewed, variants());
        assert!(pkg.verify_digest());
        pkg.platform_variants[0].text.push('!');
        assert!(!pkg.verify_digest());
    }

    #[test]
    fn test_package_json_is_camel_case() {
        let pkg = ContentPackage::assemble(&reviewed(), variants());
        let json = serde_json::to_value(&pkg).unwrap();
        assert!(json["longForm"].is_string());
        assert_eq!(json["platformVariants"][0]["platform"], "x");
        assert_eq!(json["contentDigest"].as_str().unwrap().len(), 64);
    }
}
