use std::sync::Arc;

use async_trait::async_trait;
use hashwire_core::{GenerationParams, TextGenerator, TextResult};

use crate::facts;
use crate::package::{Draft, ResearchBrief};
use crate::stage::{Stage, StageFailed, StageKind};

const SYSTEM_PROMPT: &str = "You write accurate long-form articles about Bitcoin mining. \
Use only the figures you are given. Never invent statistics.";

/// Turns a research brief into a long-form draft via the text generator.
pub struct Writer {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl Writer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            params: GenerationParams::json()
                .with_temperature(0.7)
                .with_max_tokens(2048)
                .with_system(SYSTEM_PROMPT),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn prompt(brief: &ResearchBrief) -> String {
        let topic = &brief.topic;
        let mut prompt = format!(
            "Write a long-form article.\nTitle idea: {}\nAngle: {}\nAudience level: {:?}\n",
            topic.title, topic.description, topic.difficulty
        );
        if !topic.keywords.is_empty() {
            prompt.push_str(&format!("Keywords: {}\n", topic.keywords.join(", ")));
        }
        if !brief.facts.is_empty() {
            prompt.push_str("\nVerified figures (the only numbers you may use):\n");
            for fact in brief.facts.iter().chain(&brief.context) {
                prompt.push_str(&format!("- {fact}\n"));
            }
        }
        if !brief.needs_evidence.is_empty() {
            let gaps: Vec<&str> = brief.needs_evidence.iter().map(|k| facts::label(*k)).collect();
            prompt.push_str(&format!(
                "\nNo verified data for: {}. Discuss these qualitatively without figures.\n",
                gaps.join(", ")
            ));
        }
        if !brief.sources.is_empty() {
            prompt.push_str("\nSources:\n");
            for source in &brief.sources {
                prompt.push_str(&format!("- {} ({})\n", source.title, source.url));
            }
        }
        prompt.push_str("\nRespond with JSON: {\"title\": string, \"body\": string}.");
        prompt
    }
}

/// Split a generator answer into `(title, body)`.
///
/// Structured answers use their `title`/`body` fields; plain text may lead
/// with a markdown heading.
fn parse_article(result: TextResult) -> (Option<String>, String) {
    if let Some(json) = result.to_json() {
        if let Some(body) = json.get("body").and_then(|b| b.as_str()) {
            let title = json
                .get("title")
                .and_then(|t| t.as_str())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            return (title, body.trim().to_string());
        }
    }

    let text = result.into_text();
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('#') {
        let (heading, body) = rest.split_once('\n').unwrap_or((rest, ""));
        let title = heading.trim_start_matches('#').trim().to_string();
        return (Some(title).filter(|t| !t.is_empty()), body.trim().to_string());
    }
    (None, text.trim().to_string())
}

#[async_trait]
impl Stage<ResearchBrief, Draft> for Writer {
    fn kind(&self) -> StageKind {
        StageKind::Writer
    }

    async fn run(&self, brief: ResearchBrief) -> Result<Draft, StageFailed> {
        let topic_id = brief.topic.id;
        let prompt = Self::prompt(&brief);
        let result = self
            .generator
            .generate(&prompt, &self.params)
            .await
            .map_err(|e| StageFailed::new(StageKind::Writer, topic_id, e.to_string()))?;

        let (title, body) = parse_article(result);
        if body.is_empty() {
            return Err(StageFailed::new(StageKind::Writer, topic_id, "empty draft"));
        }
        Ok(Draft {
            title: title.unwrap_or_else(|| brief.topic.title.clone()),
            body,
            brief,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{Topic, TopicCategory};
    use chrono::Utc;
    use hashwire_core::fakes::ScriptedGenerator;
    use hashwire_core::{DataSnapshot, MetricKind, SustainabilitySnapshot, TrendSnapshot};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn brief() -> ResearchBrief {
        let snapshot = Arc::new(DataSnapshot {
            on_chain: BTreeMap::new(),
            sustainability: SustainabilitySnapshot::default(),
            trends: TrendSnapshot::default(),
            timestamp: Utc::now(),
        });
        ResearchBrief {
            topic: Topic::new("Hashrate climbs", "Security angle", snapshot, TopicCategory::NetworkSecurity),
            facts: vec!["Bitcoin price: $64,000 (source: mempool)".to_string()],
            needs_evidence: vec![MetricKind::Hashrate],
            context: vec![],
            sources: vec![],
        }
    }

    #[test]
    fn test_prompt_lists_facts_and_gaps() {
        let prompt = Writer::prompt(&brief());
        assert!(prompt.contains("- Bitcoin price: $64,000 (source: mempool)"));
        assert!(prompt.contains("No verified data for: Network hashrate"));
        assert!(prompt.contains("Title idea: Hashrate climbs"));
    }

    #[tokio::test]
    async fn test_structured_answer() {
        let generator = Arc::new(ScriptedGenerator::json(
            json!({"title": "Security budget", "body": "Miners keep hashing."}),
        ));
        let draft = Writer::new(generator).run(brief()).await.unwrap();
        assert_eq!(draft.title, "Security budget");
        assert_eq!(draft.body, "Miners keep hashing.");
    }

    #[tokio::test]
    async fn test_plain_answer_with_heading() {
        let generator = Arc::new(ScriptedGenerator::plain("# Heading here\n\nBody text."));
        let draft = Writer::new(generator).run(brief()).await.unwrap();
        assert_eq!(draft.title, "Heading here");
        assert_eq!(draft.body, "Body text.");
    }

    #[tokio::test]
    async fn test_plain_answer_keeps_topic_title() {
        let generator = Arc::new(ScriptedGenerator::plain("Just a body."));
        let draft = Writer::new(generator).run(brief()).await.unwrap();
        assert_eq!(draft.title, "Hashrate climbs");
    }

    #[tokio::test]
    async fn test_generator_failure_is_stage_failure() {
        let generator = Arc::new(ScriptedGenerator::failing());
        let err = Writer::new(generator).run(brief()).await.unwrap_err();
        assert_eq!(err.stage, StageKind::Writer);
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let generator = Arc::new(ScriptedGenerator::json(json!({"title": "T", "body": "  "})));
        let err = Writer::new(generator).run(brief()).await.unwrap_err();
        assert_eq!(err.reason, "empty draft");
    }
}
