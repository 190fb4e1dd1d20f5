//! Hashrate derived from network difficulty.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ProviderClient, ProviderError};
use crate::domain::MetricKind;
use crate::fallback::{FallbackResolver, Normalizer};

/// Target block interval in seconds.
pub const TARGET_BLOCK_TIME_SECS: f64 = 600.0;

/// Last-resort hashrate provider: `difficulty * 2^32 / block_time`.
///
/// Difficulty is resolved through its own fallback chain so a single
/// difficulty outage does not take this provider down with it.
pub struct DerivedHashrateProvider {
    difficulty_chain: Vec<Arc<dyn ProviderClient>>,
    resolver: FallbackResolver,
    block_time_secs: f64,
}

impl DerivedHashrateProvider {
    pub fn new(difficulty_chain: Vec<Arc<dyn ProviderClient>>, resolver: FallbackResolver) -> Self {
        Self {
            difficulty_chain,
            resolver,
            block_time_secs: TARGET_BLOCK_TIME_SECS,
        }
    }

    pub fn with_block_time(mut self, secs: f64) -> Self {
        self.block_time_secs = secs;
        self
    }
}

pub fn hashrate_from_difficulty(difficulty: f64, block_time_secs: f64) -> f64 {
    difficulty * 2f64.powi(32) / block_time_secs
}

#[async_trait]
impl ProviderClient for DerivedHashrateProvider {
    fn name(&self) -> &str {
        "derived:difficulty"
    }

    fn metric(&self) -> MetricKind {
        MetricKind::Hashrate
    }

    async fn fetch(&self) -> Result<f64, ProviderError> {
        if self.block_time_secs <= 0.0 {
            return Err(ProviderError::Malformed(format!(
                "invalid block time {}",
                self.block_time_secs
            )));
        }
        let resolution = self
            .resolver
            .resolve(MetricKind::Difficulty, &self.difficulty_chain, Normalizer::Identity)
            .await;
        let difficulty = resolution
            .metric
            .value
            .ok_or_else(|| ProviderError::Unavailable("difficulty unknown".to_string()))?;
        Ok(hashrate_from_difficulty(difficulty, self.block_time_secs))
    }

    /// Room for every difficulty source to use its own per-call timeout.
    fn call_budget(&self, default: Duration) -> Duration {
        let sources = u32::try_from(self.difficulty_chain.len().max(1)).unwrap_or(u32::MAX);
        default.max(self.resolver.call_timeout().saturating_mul(sources))
    }
}
