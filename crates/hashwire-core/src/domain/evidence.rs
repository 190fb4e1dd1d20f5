//! Evidence provenance attached to extracted values.

use serde::{Deserialize, Serialize};

/// Where an extracted value came from. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub title: String,
    pub url: String,
    pub site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

impl EvidenceSource {
    /// Create a source, deriving `site` from the URL host.
    pub fn new(title: impl Into<String>, url: impl Into<String>, published_date: Option<String>) -> Self {
        let url = url.into();
        let site = site_of(&url);
        Self {
            title: title.into(),
            url,
            site,
            published_date,
        }
    }
}

/// A candidate web document: provenance plus its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub source: EvidenceSource,
    pub body: String,
}

impl EvidenceDocument {
    pub fn new(source: EvidenceSource, body: impl Into<String>) -> Self {
        Self {
            source,
            body: body.into(),
        }
    }

    /// Title and body joined, as fed to extraction.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.source.title, self.body)
    }
}

/// Host portion of `url` without a leading `www.`, or the raw string if unparsable.
pub fn site_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}
