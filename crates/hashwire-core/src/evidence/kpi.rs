//! Sustainability KPIs targeted by evidence extraction.

use serde::{Deserialize, Serialize};

use crate::domain::{MetricKind, SanityBounds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    RenewableShare,
    Pue,
    CarbonIntensity,
    BreakEvenPrice,
}

impl Kpi {
    pub const ALL: [Kpi; 4] = [
        Kpi::RenewableShare,
        Kpi::Pue,
        Kpi::CarbonIntensity,
        Kpi::BreakEvenPrice,
    ];

    pub fn metric_kind(&self) -> MetricKind {
        match self {
            Kpi::RenewableShare => MetricKind::RenewableShare,
            Kpi::Pue => MetricKind::Pue,
            Kpi::CarbonIntensity => MetricKind::CarbonIntensity,
            Kpi::BreakEvenPrice => MetricKind::BreakEvenPrice,
        }
    }

    /// Field name used in generator prompts and responses.
    pub fn key(&self) -> &'static str {
        self.metric_kind().name()
    }

    pub fn bounds(&self) -> SanityBounds {
        self.metric_kind().bounds()
    }

    pub fn accepts(&self, value: f64) -> bool {
        self.metric_kind().accepts(value)
    }

    /// One-line description for extraction prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            Kpi::RenewableShare => "share of bitcoin mining energy from renewable sources, in percent",
            Kpi::Pue => "power usage effectiveness of mining facilities (ratio, e.g. 1.3)",
            Kpi::CarbonIntensity => "carbon intensity of mining electricity in kg CO2 per kWh",
            Kpi::BreakEvenPrice => "average miner break-even bitcoin price in USD",
        }
    }
}

impl std::fmt::Display for Kpi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
