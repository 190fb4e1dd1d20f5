//! Evidence extraction: numeric KPIs from unstructured documents.
//!
//! # Module layout
//!
//! - [`kpi`]: the target KPI set and its bounds
//! - [`patterns`]: deterministic regex extraction per KPI
//! - [`consensus`]: agreement across independent sources
//! - [`search`]: web search producing candidate documents
//!
//! Resolution order per KPI: cross-source consensus, then the generator's
//! structured answer, then a pattern match over the combined text. A KPI
//! with no in-bounds candidate is reported missing, never guessed.

pub mod consensus;
pub mod kpi;
pub mod patterns;
pub mod search;

pub use consensus::{find_consensus, Candidate, Consensus, DEFAULT_TOLERANCE};
pub use kpi::Kpi;
pub use search::{
    BravePlan, BraveSearchClient, BraveSearchConfig, DisabledSearch, EvidenceSearch, SearchError,
    SearchRequest,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{EvidenceDocument, EvidenceSource, HashwireError, Metric};
use crate::metrics::METRICS;
use crate::obs;
use crate::textgen::{GenerationParams, TextGenerator};

/// Longest document body included in the extraction prompt, in characters.
const PROMPT_DOC_CHARS: usize = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Consensus,
    Generated,
    Pattern,
}

impl ExtractionMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::Consensus => "extraction:consensus",
            ExtractionMethod::Generated => "extraction:generated",
            ExtractionMethod::Pattern => "extraction:pattern",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedValue {
    pub value: f64,
    pub method: ExtractionMethod,
    pub sources: Vec<EvidenceSource>,
}

impl ExtractedValue {
    pub fn into_metric(self, kpi: Kpi) -> Metric {
        Metric::resolved(kpi.metric_kind(), self.value, self.method.label()).with_evidence(self.sources)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub values: BTreeMap<Kpi, ExtractedValue>,
    pub missing: Vec<Kpi>,
    pub documents_considered: usize,
}

impl ExtractionReport {
    pub fn get(&self, kpi: Kpi) -> Option<&ExtractedValue> {
        self.values.get(&kpi)
    }

    /// Like [`get`](Self::get), for callers that cannot proceed without the value.
    pub fn require(&self, kpi: Kpi) -> crate::Result<&ExtractedValue> {
        self.get(kpi).ok_or_else(|| extraction_failed(kpi))
    }

    /// Every KPI as a metric; missing ones are unknown.
    pub fn metrics(&self, kpis: &[Kpi]) -> BTreeMap<crate::domain::MetricKind, Metric> {
        kpis.iter()
            .map(|kpi| {
                let metric = match self.values.get(kpi) {
                    Some(v) => v.clone().into_metric(*kpi),
                    None => Metric::unknown(kpi.metric_kind()),
                };
                (kpi.metric_kind(), metric)
            })
            .collect()
    }
}

fn extraction_failed(kpi: Kpi) -> HashwireError {
    HashwireError::ExtractionFailed {
        kpi: kpi.key().to_string(),
    }
}

/// What the generator said about one KPI.
#[derive(Debug, Clone, PartialEq)]
struct GeneratedAnswer {
    value: f64,
    source: Option<EvidenceSource>,
}

pub struct EvidenceExtractor {
    generator: Arc<dyn TextGenerator>,
    tolerance: f64,
}

impl EvidenceExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Extract `kpis` from `documents`. Never fails; unresolved KPIs are listed as missing.
    pub async fn extract(&self, documents: &[EvidenceDocument], kpis: &[Kpi]) -> ExtractionReport {
        let mut report = ExtractionReport {
            documents_considered: documents.len(),
            ..ExtractionReport::default()
        };
        if documents.is_empty() {
            report.missing = kpis.to_vec();
            for kpi in kpis {
                obs::emit_extraction_failed(kpi.key(), "no documents");
            }
            return report;
        }

        let (raw_answer, generated) = self.ask_generator(documents, kpis).await;
        let combined = combined_text(&raw_answer, documents);

        for kpi in kpis {
            let mut candidates: Vec<Candidate> = documents
                .iter()
                .filter_map(|doc| {
                    patterns::extract(*kpi, &doc.text()).map(|value| Candidate {
                        value,
                        source: doc.source.clone(),
                    })
                })
                .collect();
            let answer = generated.get(kpi);
            if let Some(GeneratedAnswer {
                value,
                source: Some(source),
            }) = answer
            {
                if !candidates.iter().any(|c| c.source.site == source.site) {
                    candidates.push(Candidate {
                        value: *value,
                        source: source.clone(),
                    });
                }
            }

            let extracted = if let Some(consensus) = find_consensus(&candidates, self.tolerance) {
                Some(ExtractedValue {
                    value: consensus.value,
                    method: ExtractionMethod::Consensus,
                    sources: consensus.sources,
                })
            } else if let Some(answer) = answer {
                Some(ExtractedValue {
                    value: answer.value,
                    method: ExtractionMethod::Generated,
                    sources: answer.source.iter().cloned().collect(),
                })
            } else {
                patterns::extract(*kpi, &combined).map(|value| ExtractedValue {
                    value,
                    method: ExtractionMethod::Pattern,
                    sources: candidates
                        .iter()
                        .find(|c| c.value == value)
                        .map(|c| vec![c.source.clone()])
                        .unwrap_or_default(),
                })
            };

            match extracted {
                Some(value) => {
                    debug!(kpi = %kpi, value = value.value, method = ?value.method, "kpi extracted");
                    report.values.insert(*kpi, value);
                }
                None => {
                    METRICS.inc_extraction_failures();
                    let err = extraction_failed(*kpi);
                    obs::emit_extraction_failed(kpi.key(), &err.to_string());
                    report.missing.push(*kpi);
                }
            }
        }

        info!(
            documents = documents.len(),
            extracted = report.values.len(),
            missing = report.missing.len(),
            "evidence extraction finished"
        );
        report
    }

    async fn ask_generator(
        &self,
        documents: &[EvidenceDocument],
        kpis: &[Kpi],
    ) -> (String, BTreeMap<Kpi, GeneratedAnswer>) {
        let prompt = extraction_prompt(documents, kpis);
        let params = GenerationParams::json()
            .with_max_tokens(512)
            .with_system("You extract numeric facts from documents. Answer with JSON only.");

        let result = match self.generator.generate(&prompt, &params).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "generator unavailable for extraction, using patterns only");
                return (String::new(), BTreeMap::new());
            }
        };

        let json = result.to_json();
        let raw = result.into_text();
        let answers = json
            .map(|value| parse_generated(&value, kpis, documents))
            .unwrap_or_default();
        (raw, answers)
    }
}

fn extraction_prompt(documents: &[EvidenceDocument], kpis: &[Kpi]) -> String {
    let mut prompt = String::from(
        "Read the documents below and report these values for bitcoin mining. \
         Use null when a value is not stated.\n\n",
    );
    for kpi in kpis {
        prompt.push_str(&format!("- {}: {}\n", kpi.key(), kpi.describe()));
    }
    prompt.push_str(
        "\nRespond with a JSON object keyed by the names above. Each entry is either a number, \
         null, or {\"value\": number, \"source\": url}.\n\n",
    );
    for (i, doc) in documents.iter().enumerate() {
        let body: String = doc.body.chars().take(PROMPT_DOC_CHARS).collect();
        prompt.push_str(&format!(
            "[{}] {} ({})\n{}\n\n",
            i + 1,
            doc.source.title,
            doc.source.url,
            body
        ));
    }
    prompt
}

fn parse_generated(
    value: &Value,
    kpis: &[Kpi],
    documents: &[EvidenceDocument],
) -> BTreeMap<Kpi, GeneratedAnswer> {
    let mut answers = BTreeMap::new();
    for kpi in kpis {
        let Some(entry) = value.get(kpi.key()) else {
            continue;
        };
        let (number, cited) = match entry {
            Value::Object(obj) => (
                obj.get("value").and_then(number_of),
                obj.get("source").and_then(Value::as_str),
            ),
            other => (number_of(other), None),
        };
        let Some(number) = number.filter(|v| kpi.accepts(*v)) else {
            if number.is_some() {
                debug!(kpi = %kpi, "generated value out of bounds, discarded");
            }
            continue;
        };
        let source = cited.and_then(|url| {
            documents
                .iter()
                .find(|d| d.source.url == url)
                .map(|d| d.source.clone())
        });
        answers.insert(*kpi, GeneratedAnswer { value: number, source });
    }
    answers
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn combined_text(raw_answer: &str, documents: &[EvidenceDocument]) -> String {
    let mut text = String::from(raw_answer);
    for doc in documents {
        text.push('\n');
        text.push_str(&doc.text());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedGenerator;
    use serde_json::json;

    fn doc(url: &str, body: &str) -> EvidenceDocument {
        EvidenceDocument::new(EvidenceSource::new("doc", url, None), body)
    }

    #[tokio::test]
    async fn test_consensus_beats_outlier() {
        let docs = [
            doc("https://a.example/1", "Sites report a PUE of 1.4 this year."),
            doc("https://b.example/2", "Average PUE of 1.45 across the fleet."),
            doc("https://c.example/3", "One old facility had PUE of 2.5."),
        ];
        let extractor = EvidenceExtractor::new(Arc::new(ScriptedGenerator::failing()));
        let report = extractor.extract(&docs, &[Kpi::Pue]).await;
        let pue = report.get(Kpi::Pue).unwrap();
        assert_eq!(pue.method, ExtractionMethod::Consensus);
        assert!((pue.value - 1.425).abs() < 1e-9);
        assert_eq!(pue.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_generated_answer_used_without_consensus() {
        let docs = [doc("https://a.example/1", "A long report without obvious numbers.")];
        let generator = ScriptedGenerator::json(json!({
            "renewable_share": {"value": 52.4, "source": "https://a.example/1"},
            "pue": null
        }));
        let report = EvidenceExtractor::new(Arc::new(generator))
            .extract(&docs, &[Kpi::RenewableShare, Kpi::Pue])
            .await;
        let share = report.get(Kpi::RenewableShare).unwrap();
        assert_eq!(share.method, ExtractionMethod::Generated);
        assert_eq!(share.value, 52.4);
        assert_eq!(share.sources[0].url, "https://a.example/1");
        assert_eq!(report.missing, vec![Kpi::Pue]);
    }

    #[tokio::test]
    async fn test_out_of_bounds_generated_value_discarded() {
        let docs = [doc("https://a.example/1", "nothing here")];
        let generator = ScriptedGenerator::json(json!({"pue": 0.4}));
        let report = EvidenceExtractor::new(Arc::new(generator))
            .extract(&docs, &[Kpi::Pue])
            .await;
        assert!(report.get(Kpi::Pue).is_none());
        assert_eq!(report.missing, vec![Kpi::Pue]);
    }

    #[tokio::test]
    async fn test_pattern_fallback_from_single_document() {
        let docs = [doc(
            "https://a.example/1",
            "Miners need roughly $38,500 to break-even? The break-even price sits near $38,500.",
        )];
        let report = EvidenceExtractor::new(Arc::new(ScriptedGenerator::plain("I could not find it.")))
            .extract(&docs, &[Kpi::BreakEvenPrice])
            .await;
        let be = report.get(Kpi::BreakEvenPrice).unwrap();
        assert_eq!(be.method, ExtractionMethod::Pattern);
        assert_eq!(be.value, 38_500.0);
        assert_eq!(be.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_require_reports_extraction_failure() {
        let docs = [doc("https://a.example/1", "nothing here")];
        let report = EvidenceExtractor::new(Arc::new(ScriptedGenerator::failing()))
            .extract(&docs, &[Kpi::Pue])
            .await;
        let err = report.require(Kpi::Pue).unwrap_err();
        assert_eq!(err.kind(), Some(crate::domain::ErrorKind::ExtractionFailed));
        assert_eq!(err.to_string(), "no value could be extracted for pue");
    }

    #[tokio::test]
    async fn test_no_documents_reports_all_missing() {
        let report = EvidenceExtractor::new(Arc::new(ScriptedGenerator::failing()))
            .extract(&[], &Kpi::ALL)
            .await;
        assert!(report.values.is_empty());
        assert_eq!(report.missing, Kpi::ALL.to_vec());
    }

    #[test]
    fn test_report_metrics_marks_missing_unknown() {
        let mut report = ExtractionReport::default();
        report.values.insert(
            Kpi::Pue,
            ExtractedValue {
                value: 1.3,
                method: ExtractionMethod::Pattern,
                sources: vec![],
            },
        );
        report.missing.push(Kpi::CarbonIntensity);
        let metrics = report.metrics(&[Kpi::Pue, Kpi::CarbonIntensity]);
        assert_eq!(metrics[&crate::domain::MetricKind::Pue].value, Some(1.3));
        assert!(!metrics[&crate::domain::MetricKind::CarbonIntensity].is_known());
    }

    #[test]
    fn test_number_of_accepts_strings() {
        assert_eq!(number_of(&json!("52.4%")), Some(52.4));
        assert_eq!(number_of(&json!("38,500")), Some(38_500.0));
        assert_eq!(number_of(&json!(true)), None);
    }
}
