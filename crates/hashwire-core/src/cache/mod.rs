//! Two-tier caching.
//!
//! - [`ttl`]: short-lived values (prices, mempool, network stats)
//! - [`monthly`]: extracted KPIs valid for the calendar month
//!
//! Only successful resolutions are cached; an unknown metric is re-resolved
//! on the next call.

pub mod monthly;
pub mod ttl;

pub use monthly::{MonthKey, MonthlyCache};
pub use ttl::TtlCache;

use crate::domain::{Metric, MetricKind};
use crate::fallback::{FallbackResolver, MetricChain};

/// A [`FallbackResolver`] fronted by a per-metric TTL cache.
pub struct CachedResolver {
    resolver: FallbackResolver,
    cache: TtlCache<MetricKind, Metric>,
}

impl CachedResolver {
    pub fn new(resolver: FallbackResolver) -> Self {
        Self {
            resolver,
            cache: TtlCache::new(),
        }
    }

    pub fn resolver(&self) -> &FallbackResolver {
        &self.resolver
    }

    pub async fn resolve(&self, chain: &MetricChain) -> Metric {
        if let Some(hit) = self.cache.get(&chain.kind) {
            return hit;
        }
        let resolution = self.resolver.resolve_chain(chain).await;
        if resolution.metric.is_known() {
            self.cache
                .insert(chain.kind, resolution.metric.clone(), chain.ttl);
        }
        resolution.metric
    }

    pub fn invalidate(&self, kind: MetricKind) {
        self.cache.invalidate(&kind);
    }
}
