//! In-memory fakes for the provider, generator and search capabilities (testing only)
//!
//! Provides `StaticProvider`, `FailingProvider`, `SlowProvider`,
//! `CountingProvider`, `ScriptedGenerator` and `StaticSearch`, which satisfy
//! the trait contracts without touching the network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{EvidenceDocument, MetricKind};
use crate::evidence::{EvidenceSearch, SearchError, SearchRequest};
use crate::providers::{ProviderClient, ProviderError};
use crate::textgen::{GenerationParams, TextGenError, TextGenerator, TextResult};

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Always returns the same reading.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    metric: MetricKind,
    value: f64,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, metric: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            metric,
            value,
        }
    }
}

#[async_trait]
impl ProviderClient for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> MetricKind {
        self.metric
    }

    async fn fetch(&self) -> Result<f64, ProviderError> {
        Ok(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Unavailable,
    Malformed,
}

/// Always fails with the configured error.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    name: String,
    metric: MetricKind,
    mode: FailureMode,
}

impl FailingProvider {
    pub fn unavailable(name: impl Into<String>, metric: MetricKind) -> Self {
        Self {
            name: name.into(),
            metric,
            mode: FailureMode::Unavailable,
        }
    }

    pub fn malformed(name: impl Into<String>, metric: MetricKind) -> Self {
        Self {
            name: name.into(),
            metric,
            mode: FailureMode::Malformed,
        }
    }
}

#[async_trait]
impl ProviderClient for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> MetricKind {
        self.metric
    }

    async fn fetch(&self) -> Result<f64, ProviderError> {
        match self.mode {
            FailureMode::Unavailable => Err(ProviderError::Unavailable("connection refused".to_string())),
            FailureMode::Malformed => Err(ProviderError::Malformed("unexpected body".to_string())),
        }
    }
}

/// Sleeps before answering; pair with a paused tokio clock.
#[derive(Debug, Clone)]
pub struct SlowProvider {
    inner: StaticProvider,
    delay: Duration,
}

impl SlowProvider {
    pub fn new(name: impl Into<String>, metric: MetricKind, value: f64, delay: Duration) -> Self {
        Self {
            inner: StaticProvider::new(name, metric, value),
            delay,
        }
    }
}

#[async_trait]
impl ProviderClient for SlowProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn metric(&self) -> MetricKind {
        self.inner.metric()
    }

    async fn fetch(&self) -> Result<f64, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch().await
    }
}

/// Wraps a provider and counts `fetch` calls.
pub struct CountingProvider<P> {
    inner: P,
    calls: Arc<AtomicUsize>,
}

impl<P: ProviderClient> CountingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the call counter; stays valid after the provider is moved.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl<P: ProviderClient> ProviderClient for CountingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn metric(&self) -> MetricKind {
        self.inner.metric()
    }

    async fn fetch(&self) -> Result<f64, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch().await
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Result(TextResult),
    Fail,
}

/// Generator answering from a script.
///
/// Queued replies are consumed first; after that the fallback reply is used
/// for every call. Prompts are recorded for assertions.
#[derive(Debug)]
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Result(TextResult::Plain(text.into())))
    }

    pub fn json(value: Value) -> Self {
        Self::with_fallback(Reply::Result(TextResult::Structured(value)))
    }

    pub fn failing() -> Self {
        Self::with_fallback(Reply::Fail)
    }

    /// Queue a reply ahead of the fallback.
    pub fn then(self, result: TextResult) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Reply::Result(result));
        self
    }

    /// Queue a failure ahead of the fallback.
    pub fn then_fail(self) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Reply::Fail);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TextResult, TextGenError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let reply = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Result(result) => Ok(result),
            Reply::Fail => Err(TextGenError::Unavailable("scripted failure".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticSearch
// ---------------------------------------------------------------------------

/// Search returning canned documents per query (or a default set), counting calls.
#[derive(Debug, Default)]
pub struct StaticSearch {
    by_query: HashMap<String, Vec<EvidenceDocument>>,
    default_docs: Vec<EvidenceDocument>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn new(default_docs: Vec<EvidenceDocument>) -> Self {
        Self {
            default_docs,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>, docs: Vec<EvidenceDocument>) -> Self {
        self.by_query.insert(query.into(), docs);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceSearch for StaticSearch {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceDocument>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::Api {
                status: 503,
                message: "scripted failure".to_string(),
            });
        }
        Ok(self
            .by_query
            .get(&request.query)
            .unwrap_or(&self.default_docs)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_generator_queue_then_fallback() {
        let generator = ScriptedGenerator::plain("fallback")
            .then(TextResult::Plain("first".to_string()))
            .then_fail();
        let params = GenerationParams::default();
        assert_eq!(
            generator.generate("a", &params).await.unwrap(),
            TextResult::Plain("first".to_string())
        );
        assert!(generator.generate("b", &params).await.is_err());
        assert_eq!(
            generator.generate("c", &params).await.unwrap(),
            TextResult::Plain("fallback".to_string())
        );
        assert_eq!(generator.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_counting_provider_counts() {
        let provider = CountingProvider::new(StaticProvider::new("s", MetricKind::PriceUsd, 1.0));
        let calls = provider.calls();
        provider.fetch().await.unwrap();
        provider.fetch().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
