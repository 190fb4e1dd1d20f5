//! Deterministic KPI patterns over free text.
//!
//! Each function returns in-bounds candidates in order of appearance.
//! Out-of-bounds matches are discarded, never clamped.

use std::sync::LazyLock;

use regex::Regex;

use super::kpi::Kpi;

// "52.4% of bitcoin mining uses sustainable energy"
static RENEWABLE_PERCENT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,3}(?:\.\d+)?)\s*(?:%|percent)\s*(?:[\w-]+\s+){0,5}?(?:renewable|sustainable|clean|carbon[- ]free|green)",
    )
    .expect("valid renewable pattern")
});

// "renewable share reached 54.5%"
static RENEWABLE_KEYWORD_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:renewable|sustainable)[^.%\d]{0,60}?(\d{1,3}(?:\.\d+)?)\s*(?:%|percent)")
        .expect("valid renewable pattern")
});

static PUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:PUE|power usage effectiveness)\b(?:\s*\(PUE\))?[^0-9.]{0,25}?(\d(?:\.\d{1,3})?)\b")
        .expect("valid pue pattern")
});

static CARBON_INTENSITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(kilograms?|kg|grams?|g)\s*(?:of\s+)?(?:co2e?|co₂e?)?\s*(?:/|per)\s*kwh",
    )
    .expect("valid carbon pattern")
});

static BREAK_EVEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)break[- ]?even[^$]{0,80}?\$\s?(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(k\b|thousand)?",
    )
    .expect("valid break-even pattern")
});

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

pub fn renewable_share(text: &str) -> Vec<f64> {
    let mut positioned: Vec<(usize, f64)> = RENEWABLE_PERCENT_FIRST
        .captures_iter(text)
        .chain(RENEWABLE_KEYWORD_FIRST.captures_iter(text))
        .filter_map(|c| {
            let m = c.get(1)?;
            Some((m.start(), parse_number(m.as_str())?))
        })
        .collect();
    positioned.sort_by_key(|(pos, _)| *pos);
    positioned.dedup_by_key(|(pos, _)| *pos);
    positioned
        .into_iter()
        .map(|(_, v)| v)
        .filter(|v| Kpi::RenewableShare.accepts(*v))
        .collect()
}

pub fn pue(text: &str) -> Vec<f64> {
    PUE.captures_iter(text)
        .filter_map(|c| parse_number(c.get(1)?.as_str()))
        .filter(|v| Kpi::Pue.accepts(*v))
        .collect()
}

/// Carbon intensity in kg CO2/kWh; gram figures are divided by 1000.
pub fn carbon_intensity(text: &str) -> Vec<f64> {
    CARBON_INTENSITY
        .captures_iter(text)
        .filter_map(|c| {
            let value = parse_number(c.get(1)?.as_str())?;
            let unit = c.get(2)?.as_str().to_ascii_lowercase();
            Some(if unit.starts_with('k') { value } else { value / 1000.0 })
        })
        .filter(|v| Kpi::CarbonIntensity.accepts(*v))
        .collect()
}

pub fn break_even_price(text: &str) -> Vec<f64> {
    BREAK_EVEN
        .captures_iter(text)
        .filter_map(|c| {
            let value = parse_number(c.get(1)?.as_str())?;
            Some(if c.get(2).is_some() { value * 1_000.0 } else { value })
        })
        .filter(|v| Kpi::BreakEvenPrice.accepts(*v))
        .collect()
}

pub fn candidates(kpi: Kpi, text: &str) -> Vec<f64> {
    match kpi {
        Kpi::RenewableShare => renewable_share(text),
        Kpi::Pue => pue(text),
        Kpi::CarbonIntensity => carbon_intensity(text),
        Kpi::BreakEvenPrice => break_even_price(text),
    }
}

/// First in-bounds match, if any.
pub fn extract(kpi: Kpi, text: &str) -> Option<f64> {
    candidates(kpi, text).into_iter().next()
}
