//! Ordered provider fallback with per-call timeouts, normalization and sanity checks.
//!
//! [`FallbackResolver::resolve`] never fails: it walks the chain in order,
//! returns the first normalized in-bounds value, and otherwise yields
//! [`Metric::unknown`]. Every rejected attempt is recorded in the
//! [`Resolution`] and logged.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ErrorKind, HashwireError, Metric, MetricKind};
use crate::metrics::METRICS;
use crate::obs;
use crate::providers::{ProviderClient, ProviderError};

/// Default bound on a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

/// Unit normalization applied to a raw provider reading before bounds checks.
#[derive(Debug, Clone, Copy, Default)]
pub enum Normalizer {
    #[default]
    Identity,
    /// Some feeds report hashrate in EH/s, others in H/s. Readings below
    /// `threshold` are taken to be EH/s and scaled by 1e18.
    AmbiguousExaHash { threshold: f64 },
    Custom(fn(f64) -> f64),
}

impl Normalizer {
    pub const HASHRATE: Normalizer = Normalizer::AmbiguousExaHash { threshold: 1e9 };

    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Normalizer::Identity => raw,
            Normalizer::AmbiguousExaHash { threshold } => {
                if raw < *threshold {
                    raw * 1e18
                } else {
                    raw
                }
            }
            Normalizer::Custom(f) => f(raw),
        }
    }
}

/// One provider that was tried and rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub provider: String,
    pub kind: ErrorKind,
    pub reason: String,
}

impl AttemptFailure {
    /// Record a domain error against `provider`.
    pub fn from_error(provider: &str, err: &HashwireError) -> Self {
        Self {
            provider: provider.to_string(),
            kind: err.kind().unwrap_or(ErrorKind::ProviderUnavailable),
            reason: err.to_string(),
        }
    }
}

/// Outcome of resolving one metric through a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub metric: Metric,
    pub attempts: Vec<AttemptFailure>,
}

impl Resolution {
    pub fn is_known(&self) -> bool {
        self.metric.is_known()
    }
}

/// An ordered provider chain for one metric, with its normalizer and cache TTL.
#[derive(Clone)]
pub struct MetricChain {
    pub kind: MetricKind,
    pub providers: Vec<Arc<dyn ProviderClient>>,
    pub normalizer: Normalizer,
    pub ttl: Duration,
}

impl MetricChain {
    pub fn new(kind: MetricKind, ttl: Duration) -> Self {
        Self {
            kind,
            providers: Vec::new(),
            normalizer: Normalizer::Identity,
            ttl,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ProviderClient>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for MetricChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricChain")
            .field("kind", &self.kind)
            .field("providers", &self.provider_names())
            .field("normalizer", &self.normalizer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FallbackResolver {
    call_timeout: Duration,
}

impl Default for FallbackResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl FallbackResolver {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub async fn resolve_chain(&self, chain: &MetricChain) -> Resolution {
        self.resolve(chain.kind, &chain.providers, chain.normalizer)
            .await
    }

    /// Try `providers` in order and return the first acceptable value.
    pub async fn resolve(
        &self,
        kind: MetricKind,
        providers: &[Arc<dyn ProviderClient>],
        normalizer: Normalizer,
    ) -> Resolution {
        let mut attempts = Vec::new();

        for provider in providers {
            METRICS.inc_provider_calls();
            let budget = provider.call_budget(self.call_timeout);
            let outcome = match tokio::time::timeout(budget, provider.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(budget)),
            };

            let failure = match outcome {
                Ok(raw) => {
                    let value = normalizer.apply(raw);
                    if kind.accepts(value) {
                        debug!(metric = %kind, provider = provider.name(), value, "metric resolved");
                        obs::emit_metric_resolved(kind.name(), provider.name(), attempts.len());
                        return Resolution {
                            metric: Metric::resolved(kind, value, provider.name()),
                            attempts,
                        };
                    }
                    let bounds = kind.bounds();
                    let err = HashwireError::OutOfRange {
                        metric: kind.name().to_string(),
                        value,
                        min: bounds.min,
                        max: bounds.max,
                    };
                    AttemptFailure::from_error(provider.name(), &err)
                }
                Err(err) => {
                    AttemptFailure::from_error(provider.name(), &err.into_domain(provider.name()))
                }
            };

            METRICS.inc_provider_failures();
            warn!(
                metric = %kind,
                provider = %failure.provider,
                kind = %failure.kind,
                reason = %failure.reason,
                "provider rejected, falling back"
            );
            attempts.push(failure);
        }

        obs::emit_metric_unknown(kind.name(), attempts.len());
        Resolution {
            metric: Metric::unknown(kind),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingProvider, SlowProvider, StaticProvider};

    fn arc<P: ProviderClient + 'static>(p: P) -> Arc<dyn ProviderClient> {
        Arc::new(p)
    }

    #[test]
    fn test_ambiguous_exahash_normalizer() {
        let n = Normalizer::HASHRATE;
        assert_eq!(n.apply(450.0), 4.5e20);
        assert_eq!(n.apply(4.5e20), 4.5e20);
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let resolver = FallbackResolver::default();
        let chain = [
            arc(StaticProvider::new("a", MetricKind::PriceUsd, 65_000.0)),
            arc(StaticProvider::new("b", MetricKind::PriceUsd, 66_000.0)),
        ];
        let res = resolver
            .resolve(MetricKind::PriceUsd, &chain, Normalizer::Identity)
            .await;
        assert_eq!(res.metric.value, Some(65_000.0));
        assert_eq!(res.metric.source.as_deref(), Some("a"));
        assert!(res.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_falls_through() {
        let resolver = FallbackResolver::default();
        let chain = [
            arc(StaticProvider::new("bogus", MetricKind::PriceUsd, 5.0)),
            arc(StaticProvider::new("good", MetricKind::PriceUsd, 65_000.0)),
        ];
        let res = resolver
            .resolve(MetricKind::PriceUsd, &chain, Normalizer::Identity)
            .await;
        assert_eq!(res.metric.source.as_deref(), Some("good"));
        assert_eq!(res.attempts.len(), 1);
        assert_eq!(res.attempts[0].kind, ErrorKind::OutOfRange);
        assert_eq!(
            res.attempts[0].reason,
            "price_usd value 5 outside sanity bounds [1000, 10000000]"
        );
    }

    #[tokio::test]
    async fn test_all_failures_yield_unknown() {
        let resolver = FallbackResolver::default();
        let chain = [
            arc(FailingProvider::unavailable("a", MetricKind::Difficulty)),
            arc(FailingProvider::malformed("b", MetricKind::Difficulty)),
        ];
        let res = resolver
            .resolve(MetricKind::Difficulty, &chain, Normalizer::Identity)
            .await;
        assert!(!res.is_known());
        assert_eq!(res.metric.value, None);
        let kinds: Vec<_> = res.attempts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::ProviderUnavailable, ErrorKind::MalformedResponse]
        );
        assert!(res.attempts[0].reason.starts_with("provider a unavailable"));
        assert!(res.attempts[1].reason.starts_with("malformed response from b"));
    }

    #[tokio::test]
    async fn test_empty_chain_is_unknown() {
        let res = FallbackResolver::default()
            .resolve(MetricKind::BlockHeight, &[], Normalizer::Identity)
            .await;
        assert!(!res.is_known());
        assert!(res.attempts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let resolver = FallbackResolver::new(Duration::from_secs(8));
        let chain = [
            arc(SlowProvider::new(
                "slow",
                MetricKind::BlockHeight,
                880_000.0,
                Duration::from_secs(30),
            )),
            arc(StaticProvider::new("fast", MetricKind::BlockHeight, 880_001.0)),
        ];
        let res = resolver
            .resolve(MetricKind::BlockHeight, &chain, Normalizer::Identity)
            .await;
        assert_eq!(res.metric.value, Some(880_001.0));
        assert_eq!(res.attempts[0].kind, ErrorKind::ProviderUnavailable);
        assert!(res.attempts[0].reason.contains("timed out"));
    }
}
