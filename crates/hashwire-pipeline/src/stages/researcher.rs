use async_trait::async_trait;
use hashwire_core::MetricKind;

use crate::facts;
use crate::package::ResearchBrief;
use crate::stage::{Stage, StageFailed, StageKind};
use crate::topic::Topic;

/// Metrics included as background context for every topic when known.
const CONTEXT_METRICS: [MetricKind; 3] = [
    MetricKind::PriceUsd,
    MetricKind::Hashrate,
    MetricKind::BlockHeight,
];

/// Collects verified facts for a topic from its snapshot.
///
/// Only known metrics become facts. Unknown focus metrics are listed in
/// `needs_evidence` and carry no number.
#[derive(Debug, Clone)]
pub struct Researcher {
    max_sources: usize,
}

impl Default for Researcher {
    fn default() -> Self {
        Self { max_sources: 6 }
    }
}

impl Researcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sources(mut self, max: usize) -> Self {
        self.max_sources = max;
        self
    }
}

#[async_trait]
impl Stage<Topic, ResearchBrief> for Researcher {
    fn kind(&self) -> StageKind {
        StageKind::Researcher
    }

    async fn run(&self, topic: Topic) -> Result<ResearchBrief, StageFailed> {
        let snapshot = &topic.snapshot;

        let mut verified = Vec::new();
        let mut needs_evidence = Vec::new();
        for kind in &topic.focus_areas {
            match snapshot.metric(*kind).and_then(facts::fact_line) {
                Some(line) => verified.push(line),
                None => needs_evidence.push(*kind),
            }
        }

        let context: Vec<String> = CONTEXT_METRICS
            .iter()
            .filter(|kind| !topic.focus_areas.contains(*kind))
            .filter_map(|kind| snapshot.metric(*kind))
            .filter_map(facts::fact_line)
            .collect();

        let mut sources = Vec::new();
        let sustainability_focus = topic
            .focus_areas
            .iter()
            .any(|k| snapshot.sustainability.metrics.contains_key(k));
        if sustainability_focus {
            sources.extend(snapshot.sustainability.provenance.iter().cloned());
        }
        let keywords: Vec<String> = topic.keywords.iter().map(|k| k.to_lowercase()).collect();
        sources.extend(
            snapshot
                .trends
                .headlines
                .iter()
                .filter(|h| {
                    let title = h.source.title.to_lowercase();
                    keywords.iter().any(|k| title.contains(k.as_str()))
                })
                .map(|h| h.source.clone()),
        );
        let mut seen = std::collections::HashSet::new();
        sources.retain(|s| seen.insert(s.url.clone()));
        sources.truncate(self.max_sources);

        if verified.is_empty() && sources.is_empty() {
            return Err(StageFailed::new(
                StageKind::Researcher,
                topic.id,
                "no verified data or sources for topic",
            ));
        }

        Ok(ResearchBrief {
            topic,
            facts: verified,
            needs_evidence,
            context,
            sources,
        })
    }
}
