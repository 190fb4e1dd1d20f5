//! Default fallback chains for the on-chain and market metrics.

use std::sync::Arc;
use std::time::Duration;

use super::derived::DerivedHashrateProvider;
use super::http::HttpMetricProvider;
use super::ProviderClient;
use crate::config::{CacheConfig, ProviderEndpoints};
use crate::domain::MetricKind;
use crate::fallback::{FallbackResolver, MetricChain, Normalizer};

/// Builds the ordered provider chains from configured base URLs.
pub struct ProviderCatalog {
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
    resolver: FallbackResolver,
}

impl ProviderCatalog {
    pub fn new(endpoints: ProviderEndpoints, client: reqwest::Client, resolver: FallbackResolver) -> Self {
        Self {
            endpoints,
            client,
            resolver,
        }
    }

    fn json(&self, name: &str, kind: MetricKind, url: String, pointer: &str) -> Arc<dyn ProviderClient> {
        Arc::new(HttpMetricProvider::json(name, kind, url, pointer, self.client.clone()))
    }

    fn text(&self, name: &str, kind: MetricKind, url: String) -> Arc<dyn ProviderClient> {
        Arc::new(HttpMetricProvider::plain_text(name, kind, url, self.client.clone()))
    }

    pub fn price_providers(&self) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        vec![
            self.json("mempool.space", MetricKind::PriceUsd, format!("{}/api/v1/prices", e.mempool), "/USD"),
            self.json(
                "coingecko",
                MetricKind::PriceUsd,
                format!("{}/api/v3/simple/price?ids=bitcoin&vs_currencies=usd", e.coingecko),
                "/bitcoin/usd",
            ),
            self.json("blockchain.info", MetricKind::PriceUsd, format!("{}/ticker", e.blockchain_info), "/USD/last"),
        ]
    }

    pub fn difficulty_providers(&self) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        vec![
            self.json(
                "mempool.space",
                MetricKind::Difficulty,
                format!("{}/api/v1/mining/hashrate/3d", e.mempool),
                "/currentDifficulty",
            ),
            self.text("blockchain.info", MetricKind::Difficulty, format!("{}/q/getdifficulty", e.blockchain_info)),
            self.json("blockchair", MetricKind::Difficulty, format!("{}/bitcoin/stats", e.blockchair), "/data/difficulty"),
        ]
    }

    pub fn hashrate_providers(&self) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        let blockchain_info: Arc<dyn ProviderClient> = Arc::new(
            HttpMetricProvider::plain_text(
                "blockchain.info",
                MetricKind::Hashrate,
                format!("{}/q/hashrate", e.blockchain_info),
                self.client.clone(),
            )
            .with_scale(1e9),
        );
        vec![
            self.json(
                "mempool.space",
                MetricKind::Hashrate,
                format!("{}/api/v1/mining/hashrate/3d", e.mempool),
                "/currentHashrate",
            ),
            self.json("blockchair", MetricKind::Hashrate, format!("{}/bitcoin/stats", e.blockchair), "/data/hashrate_24h"),
            blockchain_info,
            Arc::new(DerivedHashrateProvider::new(
                self.difficulty_providers(),
                self.resolver.clone(),
            )),
        ]
    }

    pub fn block_height_providers(&self) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        vec![
            self.text("mempool.space", MetricKind::BlockHeight, format!("{}/api/blocks/tip/height", e.mempool)),
            self.text("blockchain.info", MetricKind::BlockHeight, format!("{}/q/getblockcount", e.blockchain_info)),
            self.json("blockchair", MetricKind::BlockHeight, format!("{}/bitcoin/stats", e.blockchair), "/data/best_block_height"),
        ]
    }

    pub fn mempool_providers(&self, kind: MetricKind) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        let (mempool_ptr, blockchair_ptr) = match kind {
            MetricKind::MempoolTxCount => ("/count", "/data/mempool_transactions"),
            _ => ("/vsize", "/data/mempool_size"),
        };
        vec![
            self.json("mempool.space", kind, format!("{}/api/mempool", e.mempool), mempool_ptr),
            self.json("blockchair", kind, format!("{}/bitcoin/stats", e.blockchair), blockchair_ptr),
        ]
    }

    pub fn fee_providers(&self) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        vec![
            self.json(
                "mempool.space",
                MetricKind::FastestFeeRate,
                format!("{}/api/v1/fees/recommended", e.mempool),
                "/fastestFee",
            ),
            self.json(
                "blockchair",
                MetricKind::FastestFeeRate,
                format!("{}/bitcoin/stats", e.blockchair),
                "/data/suggested_transaction_fee_per_byte_sat",
            ),
        ]
    }

    pub fn miner_revenue_providers(&self) -> Vec<Arc<dyn ProviderClient>> {
        let e = &self.endpoints;
        vec![self.json(
            "blockchain.info",
            MetricKind::MinerRevenueUsd,
            format!("{}/stats?format=json", e.blockchain_info),
            "/miners_revenue_usd",
        )]
    }

    /// All on-chain chains with their TTLs.
    pub fn chains(&self, ttls: &CacheConfig) -> Vec<MetricChain> {
        let price_ttl = Duration::from_secs(ttls.price_ttl_secs);
        let network_ttl = Duration::from_secs(ttls.network_ttl_secs);
        let mempool_ttl = Duration::from_secs(ttls.mempool_ttl_secs);

        let with = |kind: MetricKind, ttl: Duration, providers: Vec<Arc<dyn ProviderClient>>| {
            providers
                .into_iter()
                .fold(MetricChain::new(kind, ttl), |chain, p| chain.with_provider(p))
        };

        vec![
            with(MetricKind::PriceUsd, price_ttl, self.price_providers()),
            with(MetricKind::Difficulty, network_ttl, self.difficulty_providers()),
            with(MetricKind::Hashrate, network_ttl, self.hashrate_providers())
                .with_normalizer(Normalizer::HASHRATE),
            with(MetricKind::BlockHeight, network_ttl, self.block_height_providers()),
            with(
                MetricKind::MempoolTxCount,
                mempool_ttl,
                self.mempool_providers(MetricKind::MempoolTxCount),
            ),
            with(
                MetricKind::MempoolVsize,
                mempool_ttl,
                self.mempool_providers(MetricKind::MempoolVsize),
            ),
            with(MetricKind::FastestFeeRate, mempool_ttl, self.fee_providers()),
            with(MetricKind::MinerRevenueUsd, network_ttl, self.miner_revenue_providers()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProviderCatalog {
        ProviderCatalog::new(
            ProviderEndpoints::default(),
            reqwest::Client::new(),
            FallbackResolver::default(),
        )
    }

    #[test]
    fn test_every_on_chain_metric_has_a_chain() {
        let chains = catalog().chains(&CacheConfig::default());
        let kinds: Vec<_> = chains.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, MetricKind::ON_CHAIN.to_vec());
        assert!(chains.iter().all(|c| !c.providers.is_empty()));
    }

    #[test]
    fn test_hashrate_chain_ends_with_derived_provider() {
        let chains = catalog().chains(&CacheConfig::default());
        let hashrate = chains
            .iter()
            .find(|c| c.kind == MetricKind::Hashrate)
            .unwrap();
        assert_eq!(hashrate.provider_names().last(), Some(&"derived:difficulty"));
        assert!(matches!(
            hashrate.normalizer,
            Normalizer::AmbiguousExaHash { .. }
        ));
    }

    #[test]
    fn test_providers_report_their_metric() {
        let catalog = catalog();
        for chain in catalog.chains(&CacheConfig::default()) {
            for provider in &chain.providers {
                assert_eq!(provider.metric(), chain.kind, "{}", provider.name());
            }
        }
    }
}
