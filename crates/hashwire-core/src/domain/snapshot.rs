//! The immutable data snapshot produced by one aggregation cycle.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::evidence::EvidenceSource;
use crate::domain::metric::{Metric, MetricKind};

/// Sustainability KPIs plus the documents they were extracted from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SustainabilitySnapshot {
    pub metrics: BTreeMap<MetricKind, Metric>,
    pub provenance: Vec<EvidenceSource>,
    /// Calendar month (`YYYY-MM`) the extraction belongs to.
    pub month: String,
}

/// One news/social signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub source: EvidenceSource,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub headlines: Vec<TrendSignal>,
    /// Most frequent non-trivial words across headlines, most frequent first.
    pub keywords: Vec<String>,
}

/// Consistent view of on-chain, sustainability and trend data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub on_chain: BTreeMap<MetricKind, Metric>,
    pub sustainability: SustainabilitySnapshot,
    pub trends: TrendSnapshot,
    pub timestamp: DateTime<Utc>,
}

impl DataSnapshot {
    /// Look up a metric in either the on-chain or the sustainability section.
    pub fn metric(&self, kind: MetricKind) -> Option<&Metric> {
        self.on_chain
            .get(&kind)
            .or_else(|| self.sustainability.metrics.get(&kind))
    }

    pub fn known_value(&self, kind: MetricKind) -> Option<f64> {
        self.metric(kind).and_then(|m| m.value)
    }

    /// Metrics present in the snapshot whose value is unknown.
    pub fn unknown_metrics(&self) -> Vec<MetricKind> {
        self.on_chain
            .values()
            .chain(self.sustainability.metrics.values())
            .filter(|m| !m.is_known())
            .map(|m| m.kind)
            .collect()
    }

    pub fn known_metrics(&self) -> impl Iterator<Item = &Metric> {
        self.on_chain
            .values()
            .chain(self.sustainability.metrics.values())
            .filter(|m| m.is_known())
    }
}
