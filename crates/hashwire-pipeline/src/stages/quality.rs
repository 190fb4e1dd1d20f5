use async_trait::async_trait;
use hashwire_core::MetricKind;

use crate::facts;
use crate::package::{Draft, ReviewedDraft};
use crate::stage::{Stage, StageFailed, StageKind};

pub const DEFAULT_MIN_WORDS: usize = 120;
const WORDS_PER_MINUTE: usize = 200;

/// Gates drafts on length and on figures quoted for unknown metrics.
#[derive(Debug, Clone)]
pub struct QualityChecker {
    min_words: usize,
}

impl Default for QualityChecker {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
        }
    }
}

impl QualityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }

    /// Every problem found in the draft; empty means it passes.
    pub fn review(&self, draft: &Draft) -> Vec<String> {
        let mut issues = Vec::new();
        let words = draft.body.split_whitespace().count();
        if words < self.min_words {
            issues.push(format!(
                "draft has {words} words, minimum is {}",
                self.min_words
            ));
        }
        for kind in draft.brief.topic.snapshot.unknown_metrics() {
            if let Some(sentence) = numeric_claim(&draft.body, kind) {
                issues.push(format!(
                    "figure quoted for unknown metric {}: \"{}\"",
                    kind.name(),
                    sentence
                ));
            }
        }
        issues
    }
}

/// First sentence that mentions `kind` alongside a digit.
fn numeric_claim(text: &str, kind: MetricKind) -> Option<String> {
    let terms = facts::terms(kind);
    sentences(text)
        .find(|s| {
            let lower = s.to_lowercase();
            terms.iter().any(|t| lower.contains(t)) && s.chars().any(|c| c.is_ascii_digit())
        })
        .map(|s| s.to_string())
}

/// Split on sentence punctuation followed by whitespace, and on newlines.
/// Decimal points stay inside their sentence.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            out.push(&text[start..i + c.len_utf8()]);
            start = i + c.len_utf8();
        }
    }
    out.push(&text[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty())
}

#[async_trait]
impl Stage<Draft, ReviewedDraft> for QualityChecker {
    fn kind(&self) -> StageKind {
        StageKind::QualityChecker
    }

    async fn run(&self, draft: Draft) -> Result<ReviewedDraft, StageFailed> {
        let issues = self.review(&draft);
        if !issues.is_empty() {
            return Err(StageFailed::new(
                StageKind::QualityChecker,
                draft.brief.topic.id,
                issues.join("; "),
            ));
        }
        let word_count = draft.body.split_whitespace().count();
        Ok(ReviewedDraft {
            draft,
            word_count,
            reading_minutes: word_count.div_ceil(WORDS_PER_MINUTE).max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::ResearchBrief;
    use crate::topic::{Topic, TopicCategory};
    use chrono::Utc;
    use hashwire_core::{DataSnapshot, Metric, SustainabilitySnapshot, TrendSnapshot};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn draft(body: &str) -> Draft {
        let mut on_chain = BTreeMap::new();
        on_chain.insert(MetricKind::Hashrate, Metric::unknown(MetricKind::Hashrate));
        on_chain.insert(
            MetricKind::PriceUsd,
            Metric::resolved(MetricKind::PriceUsd, 64_000.0, "mempool"),
        );
        let snapshot = Arc::new(DataSnapshot {
            on_chain,
            sustainability: SustainabilitySnapshot::default(),
            trends: TrendSnapshot::default(),
            timestamp: Utc::now(),
        });
        Draft {
            brief: ResearchBrief {
                topic: Topic::new("T", "", snapshot, TopicCategory::NetworkSecurity),
                facts: vec![],
                needs_evidence: vec![MetricKind::Hashrate],
                context: vec![],
                sources: vec![],
            },
            title: "T".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_sentences_keep_decimals() {
        let parts: Vec<&str> = sentences("PUE is 1.3 today. Next one!\nLast").collect();
        assert_eq!(parts, vec!["PUE is 1.3 today.", "Next one!", "Last"]);
    }

    #[tokio::test]
    async fn test_long_clean_draft_passes() {
        let body = "Miners keep a close eye on the network. ".repeat(20);
        let reviewed = QualityChecker::new().run(draft(&body)).await.unwrap();
        assert_eq!(reviewed.word_count, 160);
        assert_eq!(reviewed.reading_minutes, 1);
    }

    #[tokio::test]
    async fn test_short_draft_fails() {
        let err = QualityChecker::new().run(draft("Too short.")).await.unwrap_err();
        assert_eq!(err.stage, StageKind::QualityChecker);
        assert!(err.reason.contains("minimum is 120"));
    }

    #[test]
    fn test_figure_for_unknown_metric_flagged() {
        let body = "The hashrate reached 700 EH/s this week. The Bitcoin price is $64,000.";
        let issues = QualityChecker::new().with_min_words(1).review(&draft(body));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("hashrate"));
        assert!(issues[0].contains("700 EH/s"));
    }

    #[test]
    fn test_qualitative_mention_allowed() {
        let body = "Hashrate data is unavailable, but miners report steady growth.";
        assert!(QualityChecker::new().with_min_words(1).review(&draft(body)).is_empty());
    }
}
