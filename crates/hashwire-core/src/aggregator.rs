//! Data aggregation: one consistent [`DataSnapshot`] per cycle.
//!
//! On-chain metrics go through per-metric fallback chains behind a TTL
//! cache. Sustainability KPIs come from evidence extraction and are cached
//! for the calendar month. Trend headlines come from a fresh news search.
//! Nothing in here returns an error: failures surface as unknown metrics.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::{CachedResolver, MonthKey, MonthlyCache, TtlCache};
use crate::config::HashwireConfig;
use crate::domain::{
    DataSnapshot, EvidenceDocument, Metric, MetricKind, Result, SustainabilitySnapshot, TrendSignal,
    TrendSnapshot,
};
use crate::evidence::{
    BraveSearchClient, BraveSearchConfig, DisabledSearch, EvidenceExtractor, EvidenceSearch, Kpi,
    SearchRequest,
};
use crate::fallback::{FallbackResolver, MetricChain};
use crate::obs;
use crate::providers::catalog::ProviderCatalog;
use crate::textgen::TextGenerator;

const SUSTAINABILITY_KEY: &str = "sustainability";
const TRENDS_KEY: &str = "trends";
const MAX_KEYWORDS: usize = 10;

/// Search parameters for the evidence-backed sections.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSettings {
    pub sustainability_queries: Vec<String>,
    pub trends_query: String,
    pub trends_freshness: Option<String>,
    pub results_per_query: u32,
    pub trends_ttl: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        let search = crate::config::SearchConfig::default();
        Self {
            sustainability_queries: search.sustainability_queries,
            trends_query: search.trends_query,
            trends_freshness: Some(search.trends_freshness),
            results_per_query: search.results_per_query,
            trends_ttl: Duration::from_secs(crate::config::CacheConfig::default().trends_ttl_secs),
        }
    }
}

pub struct DataAggregator {
    chains: Vec<MetricChain>,
    resolver: CachedResolver,
    search: Arc<dyn EvidenceSearch>,
    extractor: EvidenceExtractor,
    monthly: MonthlyCache<SustainabilitySnapshot>,
    trends_cache: TtlCache<&'static str, TrendSnapshot>,
    settings: AggregatorSettings,
}

impl DataAggregator {
    pub fn new(
        chains: Vec<MetricChain>,
        search: Arc<dyn EvidenceSearch>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            chains,
            resolver: CachedResolver::new(FallbackResolver::default()),
            search,
            extractor: EvidenceExtractor::new(generator),
            monthly: MonthlyCache::new(),
            trends_cache: TtlCache::new(),
            settings: AggregatorSettings::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: FallbackResolver) -> Self {
        self.resolver = CachedResolver::new(resolver);
        self
    }

    pub fn with_monthly_cache(mut self, monthly: MonthlyCache<SustainabilitySnapshot>) -> Self {
        self.monthly = monthly;
        self
    }

    pub fn with_settings(mut self, settings: AggregatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wire real providers, search and generator from configuration.
    pub fn from_config(config: &HashwireConfig) -> Result<Self> {
        let client = config.http_client()?;
        let resolver = FallbackResolver::new(Duration::from_secs(config.http.timeout_secs));
        let chains = ProviderCatalog::new(config.providers.clone(), client.clone(), resolver.clone())
            .chains(&config.cache);

        let search: Arc<dyn EvidenceSearch> = match &config.search.api_key {
            Some(key) => Arc::new(BraveSearchClient::with_client(
                BraveSearchConfig::new(key.clone())
                    .with_endpoint(config.search.endpoint.clone())
                    .with_plan(config.search.plan)
                    .with_page_fetch(config.search.fetch_pages),
                client,
            )),
            None => {
                warn!("BRAVE_API_KEY not set, sustainability and trends will be unknown");
                Arc::new(DisabledSearch)
            }
        };

        let generator = config.text_generator()?;

        let monthly = match &config.cache.monthly_cache_path {
            Some(path) => MonthlyCache::persistent(path),
            None => MonthlyCache::new(),
        };

        let settings = AggregatorSettings {
            sustainability_queries: config.search.sustainability_queries.clone(),
            trends_query: config.search.trends_query.clone(),
            trends_freshness: Some(config.search.trends_freshness.clone()).filter(|f| !f.is_empty()),
            results_per_query: config.search.results_per_query,
            trends_ttl: Duration::from_secs(config.cache.trends_ttl_secs),
        };

        Ok(Self::new(chains, search, generator)
            .with_resolver(resolver)
            .with_monthly_cache(monthly)
            .with_settings(settings))
    }

    /// Resolve every on-chain chain concurrently, plus derived hashprice.
    pub async fn on_chain(&self) -> BTreeMap<MetricKind, Metric> {
        let resolved = join_all(self.chains.iter().map(|chain| self.resolver.resolve(chain))).await;
        let mut metrics: BTreeMap<MetricKind, Metric> =
            resolved.into_iter().map(|m| (m.kind, m)).collect();
        for kind in MetricKind::ON_CHAIN {
            metrics.entry(kind).or_insert_with(|| Metric::unknown(kind));
        }
        let hashprice = hashprice(&metrics);
        metrics.insert(MetricKind::HashpriceUsd, hashprice);
        metrics
    }

    pub async fn sustainability(&self) -> SustainabilitySnapshot {
        self.sustainability_at(Utc::now()).await
    }

    /// Sustainability KPIs for the month containing `now`, extracted at most once per month.
    pub async fn sustainability_at(&self, now: DateTime<Utc>) -> SustainabilitySnapshot {
        let month = MonthKey::of(now);
        if let Some(cached) = self.monthly.get(SUSTAINABILITY_KEY, month) {
            return cached;
        }

        let mut documents: Vec<EvidenceDocument> = Vec::new();
        let mut seen = HashSet::new();
        for query in &self.settings.sustainability_queries {
            let request = SearchRequest::new(query.clone(), self.settings.results_per_query);
            match self.search.search(&request).await {
                Ok(docs) => {
                    for doc in docs {
                        if seen.insert(doc.source.url.clone()) {
                            documents.push(doc);
                        }
                    }
                }
                Err(e) => warn!(query = %query, error = %e, "sustainability search failed"),
            }
        }

        let report = self.extractor.extract(&documents, &Kpi::ALL).await;
        let snapshot = SustainabilitySnapshot {
            metrics: report.metrics(&Kpi::ALL),
            provenance: documents.into_iter().map(|d| d.source).collect(),
            month: month.to_string(),
        };

        if snapshot.metrics.values().any(Metric::is_known) {
            if let Err(e) = self.monthly.insert(SUSTAINABILITY_KEY, snapshot.clone(), month).await {
                warn!(error = %e, "failed to persist monthly cache");
            }
        }
        snapshot
    }

    pub async fn trends(&self) -> TrendSnapshot {
        if let Some(cached) = self.trends_cache.get(&TRENDS_KEY) {
            return cached;
        }

        let mut request = SearchRequest::new(self.settings.trends_query.clone(), self.settings.results_per_query * 2);
        if let Some(freshness) = &self.settings.trends_freshness {
            request = request.with_freshness(freshness.clone());
        }

        let documents = match self.search.search(&request).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "trend search failed");
                return TrendSnapshot::default();
            }
        };

        let headlines: Vec<TrendSignal> = documents
            .into_iter()
            .map(|doc| TrendSignal {
                snippet: doc.body.chars().take(280).collect(),
                source: doc.source,
            })
            .collect();
        let keywords = keywords(&headlines, MAX_KEYWORDS);
        let snapshot = TrendSnapshot { headlines, keywords };

        if !snapshot.headlines.is_empty() {
            self.trends_cache
                .insert(TRENDS_KEY, snapshot.clone(), self.settings.trends_ttl);
        }
        snapshot
    }

    /// All three sections gathered concurrently into one snapshot.
    pub async fn comprehensive(&self) -> DataSnapshot {
        let started = Instant::now();
        let (on_chain, sustainability, trends) =
            tokio::join!(self.on_chain(), self.sustainability(), self.trends());
        let snapshot = DataSnapshot {
            on_chain,
            sustainability,
            trends,
            timestamp: Utc::now(),
        };
        let unknown = snapshot.unknown_metrics().len();
        obs::emit_snapshot_built(
            snapshot.known_metrics().count(),
            unknown,
            started.elapsed().as_millis() as u64,
        );
        info!(unknown, "data snapshot assembled");
        snapshot
    }
}

/// USD earned per PH/s per day: 24h miner revenue over hashrate in PH/s.
pub fn hashprice(metrics: &BTreeMap<MetricKind, Metric>) -> Metric {
    let revenue = metrics.get(&MetricKind::MinerRevenueUsd).and_then(|m| m.value);
    let hashrate = metrics.get(&MetricKind::Hashrate).and_then(|m| m.value);
    match (revenue, hashrate) {
        (Some(revenue), Some(hashrate)) if hashrate > 0.0 => {
            Metric::resolved(MetricKind::HashpriceUsd, revenue / (hashrate / 1e15), "derived")
        }
        _ => Metric::unknown(MetricKind::HashpriceUsd),
    }
}

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "amid", "bitcoin", "btc", "could", "from", "have", "into",
    "just", "more", "news", "over", "says", "than", "that", "their", "there", "these", "this",
    "what", "when", "which", "will", "with", "would", "your",
];

/// Most frequent significant words across headline titles, most frequent first.
pub fn keywords(headlines: &[TrendSignal], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for signal in headlines {
        let mut seen_here = HashSet::new();
        for word in signal
            .source
            .title
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .map(|w| w.trim_matches('-').to_lowercase())
            .filter(|w| w.chars().count() >= 4 && !w.chars().all(|c| c.is_ascii_digit()))
            .filter(|w| !STOPWORDS.contains(&w.as_str()))
        {
            if seen_here.insert(word.clone()) {
                *counts.entry(word).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvidenceSource;

    fn signal(title: &str) -> TrendSignal {
        TrendSignal {
            source: EvidenceSource::new(title, "https://news.example/a", None),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_hashprice_from_revenue_and_hashrate() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            MetricKind::MinerRevenueUsd,
            Metric::resolved(MetricKind::MinerRevenueUsd, 45_000_000.0, "t"),
        );
        metrics.insert(
            MetricKind::Hashrate,
            Metric::resolved(MetricKind::Hashrate, 9.0e20, "t"),
        );
        let hp = hashprice(&metrics);
        assert_eq!(hp.value, Some(50.0));
    }

    #[test]
    fn test_hashprice_unknown_when_input_missing() {
        let mut metrics = BTreeMap::new();
        metrics.insert(MetricKind::Hashrate, Metric::unknown(MetricKind::Hashrate));
        assert!(!hashprice(&metrics).is_known());
    }

    #[test]
    fn test_keywords_ranked_by_headline_frequency() {
        let headlines = [
            signal("Hashrate climbs as miners expand in Texas"),
            signal("Texas miners curtail during heatwave"),
            signal("Bitcoin halving squeezes miners"),
        ];
        let kw = keywords(&headlines, 3);
        assert_eq!(kw, vec!["miners", "texas", "climbs"]);
    }
}
