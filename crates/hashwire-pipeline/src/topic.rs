//! Topics and topic generation from a data snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use hashwire_core::{DataSnapshot, MetricKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::facts;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    NetworkSecurity,
    MiningEconomics,
    NetworkActivity,
    Sustainability,
    Trends,
}

/// One work item for the pipeline.
///
/// Every topic generated in a run shares the same snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(skip)]
    pub snapshot: Arc<DataSnapshot>,
    pub keywords: Vec<String>,
    pub difficulty: Difficulty,
    pub category: TopicCategory,
    /// Metrics this topic is about.
    pub focus_areas: Vec<MetricKind>,
}

impl Topic {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        snapshot: Arc<DataSnapshot>,
        category: TopicCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            snapshot,
            keywords: Vec::new(),
            difficulty: Difficulty::Intermediate,
            category,
            focus_areas: Vec::new(),
        }
    }

    pub fn with_focus(mut self, focus: &[MetricKind]) -> Self {
        self.focus_areas = focus.to_vec();
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Focus metrics with a known value in the snapshot.
    pub fn known_focus(&self) -> usize {
        self.focus_areas
            .iter()
            .filter(|kind| self.snapshot.known_value(**kind).is_some())
            .count()
    }
}

/// Produces the batch of topics for one run.
#[async_trait]
pub trait TopicGenerator: Send + Sync {
    async fn generate(
        &self,
        snapshot: Arc<DataSnapshot>,
        count: usize,
    ) -> hashwire_core::Result<Vec<Topic>>;
}

struct Template {
    title: &'static str,
    angle: &'static str,
    category: TopicCategory,
    difficulty: Difficulty,
    focus: &'static [MetricKind],
    keywords: &'static [&'static str],
}

const TEMPLATES: &[Template] = &[
    Template {
        title: "Hashrate and difficulty: reading the network's security budget",
        angle: "How hashrate and difficulty move together and what that means for miners.",
        category: TopicCategory::NetworkSecurity,
        difficulty: Difficulty::Intermediate,
        focus: &[MetricKind::Hashrate, MetricKind::Difficulty],
        keywords: &["hashrate", "difficulty adjustment"],
    },
    Template {
        title: "Hashprice check-in: what a petahash earns today",
        angle: "Miner revenue per unit of hashpower and how price drives it.",
        category: TopicCategory::MiningEconomics,
        difficulty: Difficulty::Advanced,
        focus: &[
            MetricKind::HashpriceUsd,
            MetricKind::PriceUsd,
            MetricKind::MinerRevenueUsd,
        ],
        keywords: &["hashprice", "miner revenue"],
    },
    Template {
        title: "Inside the mempool: fees, congestion and block space",
        angle: "What the current mempool backlog says about demand for block space.",
        category: TopicCategory::NetworkActivity,
        difficulty: Difficulty::Beginner,
        focus: &[
            MetricKind::MempoolTxCount,
            MetricKind::MempoolVsize,
            MetricKind::FastestFeeRate,
        ],
        keywords: &["mempool", "transaction fees"],
    },
    Template {
        title: "Energy efficiency in Bitcoin mining facilities",
        angle: "Power usage effectiveness and the carbon footprint of industrial mining.",
        category: TopicCategory::Sustainability,
        difficulty: Difficulty::Intermediate,
        focus: &[MetricKind::Pue, MetricKind::CarbonIntensity],
        keywords: &["PUE", "energy efficiency"],
    },
    Template {
        title: "How renewable is Bitcoin mining?",
        angle: "The renewable share of the mining energy mix and where it is heading.",
        category: TopicCategory::Sustainability,
        difficulty: Difficulty::Beginner,
        focus: &[MetricKind::RenewableShare, MetricKind::CarbonIntensity],
        keywords: &["renewable energy", "sustainable mining"],
    },
    Template {
        title: "Break-even economics for miners",
        angle: "Where the average miner's break-even sits relative to the market price.",
        category: TopicCategory::MiningEconomics,
        difficulty: Difficulty::Advanced,
        focus: &[MetricKind::BreakEvenPrice, MetricKind::PriceUsd],
        keywords: &["break-even", "mining costs"],
    },
];

/// Derives topics from fixed angles on the snapshot plus trending keywords.
///
/// Angles with more known focus metrics come first; trend topics follow.
#[derive(Debug, Clone)]
pub struct SnapshotTopicGenerator {
    max_trend_topics: usize,
}

impl Default for SnapshotTopicGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotTopicGenerator {
    pub fn new() -> Self {
        Self {
            max_trend_topics: 2,
        }
    }

    pub fn with_max_trend_topics(mut self, max: usize) -> Self {
        self.max_trend_topics = max;
        self
    }

    fn describe(template: &Template, snapshot: &DataSnapshot) -> String {
        let known: Vec<String> = template
            .focus
            .iter()
            .filter_map(|kind| snapshot.metric(*kind))
            .filter_map(facts::fact_line)
            .collect();
        if known.is_empty() {
            format!(
                "{} Current figures are unavailable; rely on cited evidence only.",
                template.angle
            )
        } else {
            format!("{} Current data: {}.", template.angle, known.join("; "))
        }
    }

    pub fn topics(&self, snapshot: Arc<DataSnapshot>, count: usize) -> Vec<Topic> {
        let trend_keywords: Vec<String> = snapshot.trends.keywords.iter().take(5).cloned().collect();

        let mut angles: Vec<Topic> = TEMPLATES
            .iter()
            .map(|t| {
                let mut keywords: Vec<String> = t.keywords.iter().map(|k| k.to_string()).collect();
                keywords.extend(trend_keywords.iter().take(3).cloned());
                Topic::new(
                    t.title,
                    Self::describe(t, &snapshot),
                    Arc::clone(&snapshot),
                    t.category,
                )
                .with_focus(t.focus)
                .with_keywords(keywords)
                .with_difficulty(t.difficulty)
            })
            .collect();
        // stable: equal coverage keeps template order
        angles.sort_by_key(|topic| std::cmp::Reverse(topic.known_focus()));

        let trends = trend_keywords
            .iter()
            .take(self.max_trend_topics)
            .map(|keyword| {
                let headlines: Vec<&str> = snapshot
                    .trends
                    .headlines
                    .iter()
                    .filter(|h| h.source.title.to_lowercase().contains(keyword.as_str()))
                    .map(|h| h.source.title.as_str())
                    .take(3)
                    .collect();
                let description = if headlines.is_empty() {
                    format!("Why \"{keyword}\" is trending in Bitcoin mining news this week.")
                } else {
                    format!(
                        "Why \"{keyword}\" is trending in Bitcoin mining news. Headlines: {}.",
                        headlines.join(" | ")
                    )
                };
                Topic::new(
                    format!("Trending now: {keyword}"),
                    description,
                    Arc::clone(&snapshot),
                    TopicCategory::Trends,
                )
                .with_keywords(vec![keyword.clone(), "bitcoin mining".to_string()])
                .with_difficulty(Difficulty::Beginner)
            });

        angles.into_iter().chain(trends).take(count).collect()
    }
}

#[async_trait]
impl TopicGenerator for SnapshotTopicGenerator {
    async fn generate(
        &self,
        snapshot: Arc<DataSnapshot>,
        count: usize,
    ) -> hashwire_core::Result<Vec<Topic>> {
        Ok(self.topics(snapshot, count))
    }
}
