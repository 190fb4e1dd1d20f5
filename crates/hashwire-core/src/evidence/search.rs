//! Web search for evidence documents.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{EvidenceDocument, EvidenceSource};

pub const DEFAULT_BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Longest page body kept after fetching, in characters.
const MAX_PAGE_CHARS: usize = 20_000;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse search response: {0}")]
    Parse(String),

    #[error("empty query")]
    EmptyQuery,
}

/// Options for one search call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub count: u32,
    /// Brave freshness filter: `pd`, `pw`, `pm` or `py`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, count: u32) -> Self {
        Self {
            query: query.into(),
            count,
            freshness: None,
        }
    }

    pub fn with_freshness(mut self, freshness: impl Into<String>) -> Self {
        self.freshness = Some(freshness.into());
        self
    }
}

#[async_trait]
pub trait EvidenceSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceDocument>, SearchError>;
}

/// Search used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSearch;

#[async_trait]
impl EvidenceSearch for DisabledSearch {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<EvidenceDocument>, SearchError> {
        Err(SearchError::NotConfigured)
    }
}

/// Brave Search API plan tier, determines rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BravePlan {
    #[default]
    Free,
    Base,
    Pro,
}

impl BravePlan {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "base" => Self::Base,
            "pro" => Self::Pro,
            _ => Self::Free,
        }
    }

    pub fn min_interval(&self) -> Duration {
        match self {
            Self::Free => Duration::from_millis(1000),
            Self::Base => Duration::from_millis(50),
            Self::Pro => Duration::from_millis(20),
        }
    }
}

#[derive(Clone)]
struct RateLimiter {
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(plan: BravePlan) -> Self {
        Self {
            last_request: Arc::new(Mutex::new(None)),
            min_interval: plan.min_interval(),
        }
    }

    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limiting search request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
pub struct BraveSearchConfig {
    pub api_key: String,
    pub endpoint: String,
    pub plan: BravePlan,
    /// Fetch each result page and use its paragraph text as the body.
    pub fetch_pages: bool,
    pub timeout: Duration,
}

impl BraveSearchConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_BRAVE_ENDPOINT.to_string(),
            plan: BravePlan::default(),
            fetch_pages: false,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_plan(mut self, plan: BravePlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_page_fetch(mut self, fetch_pages: bool) -> Self {
        self.fetch_pages = fetch_pages;
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "page_age")]
    published_date: Option<String>,
}

pub struct BraveSearchClient {
    config: BraveSearchConfig,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl BraveSearchClient {
    pub fn new(config: BraveSearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("hashwire/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: BraveSearchConfig, client: reqwest::Client) -> Self {
        let rate_limiter = RateLimiter::new(config.plan);
        Self {
            config,
            client,
            rate_limiter,
        }
    }

    async fn fetch_page_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(url, status = r.status().as_u16(), "page fetch rejected");
                return None;
            }
            Err(e) => {
                debug!(url, error = %e, "page fetch failed");
                return None;
            }
        };
        let html = response.text().await.ok()?;
        let text = page_text(&html);
        (!text.is_empty()).then_some(text)
    }
}

/// Paragraph and heading text of an HTML page, truncated.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("h1, h2, h3, p, li") else {
        return String::new();
    };
    let mut text = String::new();
    for element in document.select(&selector) {
        let chunk = element.text().collect::<Vec<_>>().join(" ");
        let chunk = chunk.split_whitespace().collect::<Vec<_>>().join(" ");
        if chunk.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&chunk);
        if text.len() >= MAX_PAGE_CHARS {
            break;
        }
    }
    text.chars().take(MAX_PAGE_CHARS).collect()
}

#[async_trait]
impl EvidenceSearch for BraveSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceDocument>, SearchError> {
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        self.rate_limiter.acquire().await;

        let count = request.count.clamp(1, 20);
        let mut http = self
            .client
            .get(&self.config.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.config.api_key)
            .query(&[("q", request.query.as_str()), ("count", &count.to_string())]);
        if let Some(freshness) = &request.freshness {
            http = http.query(&[("freshness", freshness.as_str())]);
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());
            warn!(status, %message, "search API returned error");
            return Err(SearchError::Api { status, message });
        }

        let parsed: BraveSearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;
        let results = parsed.web.map(|w| w.results).unwrap_or_default();

        let mut documents = Vec::with_capacity(results.len());
        for result in results {
            let source = EvidenceSource::new(result.title, result.url, result.published_date);
            let body = if self.config.fetch_pages {
                match self.fetch_page_text(&source.url).await {
                    Some(page) => format!("{}\n{}", result.description, page),
                    None => result.description,
                }
            } else {
                result.description
            };
            documents.push(EvidenceDocument::new(source, body));
        }

        info!(query = %request.query, results = documents.len(), "search completed");
        Ok(documents)
    }
}

impl std::fmt::Debug for BraveSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraveSearchClient")
            .field("endpoint", &self.config.endpoint)
            .field("plan", &self.config.plan)
            .field("fetch_pages", &self.config.fetch_pages)
            .finish()
    }
}
