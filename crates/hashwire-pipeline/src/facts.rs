//! Human-readable rendering of snapshot metrics.

use hashwire_core::{Metric, MetricKind};

pub fn label(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::PriceUsd => "Bitcoin price",
        MetricKind::Difficulty => "Network difficulty",
        MetricKind::Hashrate => "Network hashrate",
        MetricKind::BlockHeight => "Block height",
        MetricKind::MempoolTxCount => "Mempool transactions",
        MetricKind::MempoolVsize => "Mempool size",
        MetricKind::FastestFeeRate => "Fastest fee rate",
        MetricKind::MinerRevenueUsd => "Miner revenue (24h)",
        MetricKind::HashpriceUsd => "Hashprice",
        MetricKind::Pue => "Average PUE",
        MetricKind::CarbonIntensity => "Carbon intensity",
        MetricKind::RenewableShare => "Renewable share",
        MetricKind::BreakEvenPrice => "Break-even price",
    }
}

/// Lowercase terms by which prose refers to a metric.
pub fn terms(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::PriceUsd => &["bitcoin price", "btc price"],
        MetricKind::Difficulty => &["difficulty"],
        MetricKind::Hashrate => &["hashrate", "hash rate"],
        MetricKind::BlockHeight => &["block height"],
        MetricKind::MempoolTxCount | MetricKind::MempoolVsize => &["mempool"],
        MetricKind::FastestFeeRate => &["fee rate", "sat/vb"],
        MetricKind::MinerRevenueUsd => &["miner revenue"],
        MetricKind::HashpriceUsd => &["hashprice"],
        MetricKind::Pue => &["pue", "power usage effectiveness"],
        MetricKind::CarbonIntensity => &["carbon intensity"],
        MetricKind::RenewableShare => &["renewable"],
        MetricKind::BreakEvenPrice => &["break-even", "breakeven"],
    }
}

/// Display form of a known value, `None` for unknown metrics.
pub fn format_value(metric: &Metric) -> Option<String> {
    let v = metric.value?;
    let text = match metric.kind {
        MetricKind::PriceUsd | MetricKind::BreakEvenPrice => format!("${}", group_thousands(v)),
        MetricKind::Difficulty => format!("{:.2} T", v / 1e12),
        MetricKind::Hashrate => format!("{:.1} EH/s", v / 1e18),
        MetricKind::BlockHeight => group_thousands(v),
        MetricKind::MempoolTxCount => format!("{} transactions", group_thousands(v)),
        MetricKind::MempoolVsize => format!("{:.1} MvB", v / 1e6),
        MetricKind::FastestFeeRate => format!("{v:.0} sat/vB"),
        MetricKind::MinerRevenueUsd => format!("${:.1}M", v / 1e6),
        MetricKind::HashpriceUsd => format!("${v:.2}/PH/day"),
        MetricKind::Pue => format!("{v:.2}"),
        MetricKind::CarbonIntensity => format!("{v:.2} kg CO2/kWh"),
        MetricKind::RenewableShare => format!("{v:.1}%"),
    };
    Some(text)
}

/// `"Network hashrate: 612.4 EH/s (source: mempool)"`
pub fn fact_line(metric: &Metric) -> Option<String> {
    let value = format_value(metric)?;
    Some(match &metric.source {
        Some(source) => format!("{}: {} (source: {})", label(metric.kind), value, source),
        None => format!("{}: {}", label(metric.kind), value),
    })
}

fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(950.0), "950");
        assert_eq!(group_thousands(65_000.4), "65,000");
        assert_eq!(group_thousands(1_234_567.0), "1,234,567");
    }

    #[test]
    fn test_format_value_units() {
        let hashrate = Metric::resolved(MetricKind::Hashrate, 6.124e20, "mempool");
        assert_eq!(format_value(&hashrate).as_deref(), Some("612.4 EH/s"));

        let price = Metric::resolved(MetricKind::PriceUsd, 67_250.0, "coingecko");
        assert_eq!(
            fact_line(&price).as_deref(),
            Some("Bitcoin price: $67,250 (source: coingecko)")
        );
    }

    #[test]
    fn test_unknown_metric_has_no_fact() {
        assert!(fact_line(&Metric::unknown(MetricKind::Pue)).is_none());
    }
}
