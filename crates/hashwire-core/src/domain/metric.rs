//! Metric vocabulary: named numeric facts with units and sanity bounds.

use serde::{Deserialize, Serialize};

use crate::domain::evidence::EvidenceSource;

/// Inclusive plausibility range for a metric or KPI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SanityBounds {
    pub min: f64,
    pub max: f64,
}

impl SanityBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True when `value` is finite and inside `[min, max]`.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Every metric the aggregator knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    PriceUsd,
    Difficulty,
    Hashrate,
    BlockHeight,
    MempoolTxCount,
    MempoolVsize,
    FastestFeeRate,
    MinerRevenueUsd,
    HashpriceUsd,
    Pue,
    CarbonIntensity,
    RenewableShare,
    BreakEvenPrice,
}

impl MetricKind {
    /// Metrics served by structured on-chain / market APIs.
    pub const ON_CHAIN: [MetricKind; 8] = [
        MetricKind::PriceUsd,
        MetricKind::Difficulty,
        MetricKind::Hashrate,
        MetricKind::BlockHeight,
        MetricKind::MempoolTxCount,
        MetricKind::MempoolVsize,
        MetricKind::FastestFeeRate,
        MetricKind::MinerRevenueUsd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::PriceUsd => "price_usd",
            MetricKind::Difficulty => "difficulty",
            MetricKind::Hashrate => "hashrate",
            MetricKind::BlockHeight => "block_height",
            MetricKind::MempoolTxCount => "mempool_tx_count",
            MetricKind::MempoolVsize => "mempool_vsize",
            MetricKind::FastestFeeRate => "fastest_fee_rate",
            MetricKind::MinerRevenueUsd => "miner_revenue_usd",
            MetricKind::HashpriceUsd => "hashprice_usd",
            MetricKind::Pue => "pue",
            MetricKind::CarbonIntensity => "carbon_intensity",
            MetricKind::RenewableShare => "renewable_share",
            MetricKind::BreakEvenPrice => "break_even_price",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::PriceUsd | MetricKind::BreakEvenPrice => "USD",
            MetricKind::Difficulty => "",
            MetricKind::Hashrate => "H/s",
            MetricKind::BlockHeight => "blocks",
            MetricKind::MempoolTxCount => "tx",
            MetricKind::MempoolVsize => "vB",
            MetricKind::FastestFeeRate => "sat/vB",
            MetricKind::MinerRevenueUsd => "USD/24h",
            MetricKind::HashpriceUsd => "USD/PH/day",
            MetricKind::Pue => "ratio",
            MetricKind::CarbonIntensity => "kgCO2/kWh",
            MetricKind::RenewableShare => "%",
        }
    }

    pub fn bounds(&self) -> SanityBounds {
        match self {
            MetricKind::PriceUsd => SanityBounds::new(1_000.0, 10_000_000.0),
            MetricKind::Difficulty => SanityBounds::new(1e11, 1e17),
            MetricKind::Hashrate => SanityBounds::new(1e18, 1e23),
            MetricKind::BlockHeight => SanityBounds::new(500_000.0, 10_000_000.0),
            MetricKind::MempoolTxCount => SanityBounds::new(0.0, 2_000_000.0),
            MetricKind::MempoolVsize => SanityBounds::new(0.0, 1e10),
            MetricKind::FastestFeeRate => SanityBounds::new(0.0, 10_000.0),
            MetricKind::MinerRevenueUsd => SanityBounds::new(1e5, 1e10),
            MetricKind::HashpriceUsd => SanityBounds::new(1.0, 10_000.0),
            MetricKind::Pue => SanityBounds::new(1.05, 3.0),
            MetricKind::CarbonIntensity => SanityBounds::new(0.05, 2.0),
            MetricKind::RenewableShare => SanityBounds::new(10.0, 100.0),
            MetricKind::BreakEvenPrice => SanityBounds::new(5_000.0, 300_000.0),
        }
    }

    /// Whether a zero reading is impossible for this metric.
    ///
    /// Counts and fee rates may legitimately be zero; prices, difficulty and
    /// hashrate may not.
    pub fn requires_positive(&self) -> bool {
        !matches!(
            self,
            MetricKind::MempoolTxCount | MetricKind::MempoolVsize | MetricKind::FastestFeeRate
        )
    }

    /// Full acceptance check applied to every candidate value.
    pub fn accepts(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        if self.requires_positive() && value <= 0.0 {
            return false;
        }
        self.bounds().contains(value)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A resolved metric: a bounded value or the explicit unknown (`None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: Option<f64>,
    pub unit: String,
    /// Provider or extraction method that produced the value.
    pub source: Option<String>,
    /// Documents the value was derived from, if it came from extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceSource>,
}

impl Metric {
    pub fn unknown(kind: MetricKind) -> Self {
        Self {
            kind,
            value: None,
            unit: kind.unit().to_string(),
            source: None,
            evidence: Vec::new(),
        }
    }

    /// Build a metric from a candidate value.
    ///
    /// Values failing [`MetricKind::accepts`] become unknown; they are never clamped.
    pub fn resolved(kind: MetricKind, value: f64, source: impl Into<String>) -> Self {
        if !kind.accepts(value) {
            return Self::unknown(kind);
        }
        Self {
            kind,
            value: Some(value),
            unit: kind.unit().to_string(),
            source: Some(source.into()),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<EvidenceSource>) -> Self {
        if self.value.is_some() {
            self.evidence = evidence;
        }
        self
    }

    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    /// Numeric view where `0.0` stands for unknown.
    pub fn value_or_zero(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}
