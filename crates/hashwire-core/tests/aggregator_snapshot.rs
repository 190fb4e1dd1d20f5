//! End-to-end aggregation against mock provider endpoints.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use hashwire_core::fakes::{ScriptedGenerator, StaticSearch};
use hashwire_core::{
    CacheConfig, DataAggregator, EvidenceDocument, EvidenceSource, FallbackResolver, MetricKind,
    ProviderCatalog, ProviderEndpoints,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_healthy_mempool(server: &MockServer, hashrate: f64) {
    mount_json(server, "/api/v1/prices", json!({"time": 1, "USD": 65_000})).await;
    mount_json(
        server,
        "/api/v1/mining/hashrate/3d",
        json!({"currentHashrate": hashrate, "currentDifficulty": 9.0e13}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/blocks/tip/height"))
        .respond_with(ResponseTemplate::new(200).set_body_string("880000"))
        .mount(server)
        .await;
    mount_json(server, "/api/mempool", json!({"count": 45_000, "vsize": 30_000_000})).await;
    mount_json(server, "/api/v1/fees/recommended", json!({"fastestFee": 12, "halfHourFee": 8})).await;
    mount_json(server, "/stats", json!({"miners_revenue_usd": 45_000_000.0})).await;
}

fn aggregator_for(
    server: &MockServer,
    search: Arc<StaticSearch>,
    generator: ScriptedGenerator,
) -> DataAggregator {
    let resolver = FallbackResolver::new(Duration::from_secs(2));
    let chains = ProviderCatalog::new(
        ProviderEndpoints::all_at(&server.uri()),
        reqwest::Client::new(),
        resolver.clone(),
    )
    .chains(&CacheConfig::default());
    DataAggregator::new(chains, search, Arc::new(generator)).with_resolver(resolver)
}

fn doc(url: &str, body: &str) -> EvidenceDocument {
    EvidenceDocument::new(EvidenceSource::new("Mining report", url, None), body)
}

#[tokio::test]
async fn test_healthy_providers_fill_every_on_chain_metric() {
    let server = MockServer::start().await;
    mount_healthy_mempool(&server, 6.5e20).await;

    let agg = aggregator_for(&server, Arc::new(StaticSearch::default()), ScriptedGenerator::failing());
    let on_chain = agg.on_chain().await;

    for kind in MetricKind::ON_CHAIN {
        assert!(on_chain[&kind].is_known(), "{kind} should be known");
    }
    assert_eq!(on_chain[&MetricKind::PriceUsd].value, Some(65_000.0));
    assert_eq!(
        on_chain[&MetricKind::PriceUsd].source.as_deref(),
        Some("mempool.space")
    );
    assert_eq!(on_chain[&MetricKind::BlockHeight].value, Some(880_000.0));

    let hashprice = on_chain[&MetricKind::HashpriceUsd].value.unwrap();
    assert!((hashprice - 45_000_000.0 / 650_000.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_exahash_reading_is_normalized() {
    let server = MockServer::start().await;
    mount_healthy_mempool(&server, 450.0).await;

    let agg = aggregator_for(&server, Arc::new(StaticSearch::default()), ScriptedGenerator::failing());
    let on_chain = agg.on_chain().await;
    assert_eq!(on_chain[&MetricKind::Hashrate].value, Some(4.5e20));
}

#[tokio::test]
async fn test_failed_primary_falls_back_to_secondary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/prices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_json(&server, "/api/v3/simple/price", json!({"bitcoin": {"usd": 64_000}})).await;

    let agg = aggregator_for(&server, Arc::new(StaticSearch::default()), ScriptedGenerator::failing());
    let on_chain = agg.on_chain().await;
    let price = &on_chain[&MetricKind::PriceUsd];
    assert_eq!(price.value, Some(64_000.0));
    assert_eq!(price.source.as_deref(), Some("coingecko"));
}

#[tokio::test]
async fn test_out_of_range_primary_is_skipped() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/v1/prices", json!({"USD": 12})).await;
    mount_json(&server, "/ticker", json!({"USD": {"last": 63_500.5}})).await;

    let agg = aggregator_for(&server, Arc::new(StaticSearch::default()), ScriptedGenerator::failing());
    let price = agg.on_chain().await[&MetricKind::PriceUsd].clone();
    assert_eq!(price.value, Some(63_500.5));
    assert_eq!(price.source.as_deref(), Some("blockchain.info"));
}

#[tokio::test]
async fn test_hashrate_derived_from_difficulty_when_feeds_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/q/getdifficulty"))
        .respond_with(ResponseTemplate::new(200).set_body_string("90000000000000"))
        .mount(&server)
        .await;

    let agg = aggregator_for(&server, Arc::new(StaticSearch::default()), ScriptedGenerator::failing());
    let hashrate = agg.on_chain().await[&MetricKind::Hashrate].clone();
    assert_eq!(hashrate.source.as_deref(), Some("derived:difficulty"));
    let expected = 9.0e13 * 4_294_967_296.0 / 600.0;
    assert!((hashrate.value.unwrap() - expected).abs() / expected < 1e-12);
}

#[tokio::test]
async fn test_everything_down_still_yields_snapshot() {
    let server = MockServer::start().await;

    let agg = aggregator_for(&server, Arc::new(StaticSearch::failing()), ScriptedGenerator::failing());
    let snapshot = agg.comprehensive().await;

    assert!(snapshot.on_chain.values().all(|m| m.value.is_none()));
    assert!(!snapshot.on_chain[&MetricKind::HashpriceUsd].is_known());
    assert!(snapshot.sustainability.metrics.values().all(|m| !m.is_known()));
    assert!(snapshot.trends.headlines.is_empty());
    assert_eq!(snapshot.unknown_metrics().len(), 13);
}

#[tokio::test]
async fn test_sustainability_consensus_and_monthly_cache() {
    let docs = vec![
        doc(
            "https://a.example/report",
            "About 52.4% of bitcoin mining uses sustainable energy. Average PUE of 1.3.",
        ),
        doc(
            "https://b.example/survey",
            "Survey: 53% of hashrate runs on sustainable power; PUE of 1.35 is typical.",
        ),
    ];
    let search = Arc::new(StaticSearch::new(docs));
    let agg = DataAggregator::new(vec![], search.clone(), Arc::new(ScriptedGenerator::failing()));

    let march = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let first = agg.sustainability_at(march).await;
    let searches_after_first = search.calls();
    assert!(searches_after_first > 0);

    let share = &first.metrics[&MetricKind::RenewableShare];
    assert!((share.value.unwrap() - 52.7).abs() < 1e-9);
    assert_eq!(share.evidence.len(), 2);
    assert!((first.metrics[&MetricKind::Pue].value.unwrap() - 1.325).abs() < 1e-9);
    assert!(!first.metrics[&MetricKind::CarbonIntensity].is_known());
    assert_eq!(first.month, "2026-03");
    assert_eq!(first.provenance.len(), 2);

    let later_in_march = Utc.with_ymd_and_hms(2026, 3, 28, 8, 0, 0).unwrap();
    let second = agg.sustainability_at(later_in_march).await;
    assert_eq!(search.calls(), searches_after_first);
    assert_eq!(first, second);

    let april = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 1).unwrap();
    let third = agg.sustainability_at(april).await;
    assert_eq!(search.calls(), searches_after_first * 2);
    assert_eq!(third.month, "2026-04");
}

#[tokio::test]
async fn test_failed_sustainability_is_not_cached() {
    let search = Arc::new(StaticSearch::failing());
    let agg = DataAggregator::new(vec![], search.clone(), Arc::new(ScriptedGenerator::failing()));
    let at = Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap();

    agg.sustainability_at(at).await;
    let after_first = search.calls();
    agg.sustainability_at(at).await;
    assert_eq!(search.calls(), after_first * 2);
}

#[tokio::test]
async fn test_trends_cached_within_ttl() {
    let headlines = vec![
        doc("https://news.example/1", "Texas miners curtail during heatwave"),
        doc("https://other.example/2", "Miners expand in Texas"),
    ];
    let search = Arc::new(StaticSearch::new(headlines));
    let agg = DataAggregator::new(vec![], search.clone(), Arc::new(ScriptedGenerator::failing()));

    let first = agg.trends().await;
    assert_eq!(first.headlines.len(), 2);
    assert_eq!(first.headlines[1].source.site, "other.example");
    let second = agg.trends().await;
    assert_eq!(search.calls(), 1);
    assert_eq!(first, second);
}
