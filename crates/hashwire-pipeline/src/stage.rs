//! Pipeline stage contract.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hashwire_core::{emit_stage_completed, emit_stage_failed, HashwireError, METRICS};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five stages a topic passes through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Researcher,
    Writer,
    QualityChecker,
    Repurposer,
    Publisher,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Researcher => "researcher",
            StageKind::Writer => "writer",
            StageKind::QualityChecker => "quality_checker",
            StageKind::Repurposer => "repurposer",
            StageKind::Publisher => "publisher",
        }
    }

    /// Progress verb shown in run logs.
    pub fn activity(&self) -> &'static str {
        match self {
            StageKind::Researcher => "Researching",
            StageKind::Writer => "Writing",
            StageKind::QualityChecker => "Quality checking",
            StageKind::Repurposer => "Repurposing",
            StageKind::Publisher => "Publishing",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stage failed for one topic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} failed for topic {topic_id}: {reason}")]
pub struct StageFailed {
    pub stage: StageKind,
    pub topic_id: Uuid,
    pub reason: String,
}

impl StageFailed {
    pub fn new(stage: StageKind, topic_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            stage,
            topic_id,
            reason: reason.into(),
        }
    }
}

impl From<StageFailed> for HashwireError {
    fn from(err: StageFailed) -> Self {
        HashwireError::StageFailed {
            stage: err.stage.to_string(),
            topic: err.topic_id.to_string(),
            reason: err.reason,
        }
    }
}

/// One step of the content pipeline applied to one work item.
#[async_trait]
pub trait Stage<In, Out>: Send + Sync
where
    In: Send + 'static,
{
    fn kind(&self) -> StageKind;

    async fn run(&self, input: In) -> Result<Out, StageFailed>;
}

/// Run a stage under a deadline, recording the outcome.
///
/// A stage that exceeds `timeout` fails with a timeout reason; the in-flight
/// future is dropped.
pub async fn run_stage<In, Out, S>(
    stage: &S,
    input: In,
    topic_id: Uuid,
    timeout: Duration,
) -> Result<Out, StageFailed>
where
    In: Send + 'static,
    S: Stage<In, Out> + ?Sized,
{
    let kind = stage.kind();
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, stage.run(input)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(StageFailed::new(
            kind,
            topic_id,
            format!("timed out after {}s", timeout.as_secs()),
        )),
    };

    match &outcome {
        Ok(_) => {
            METRICS.inc_stages_completed();
            emit_stage_completed(
                kind.name(),
                &topic_id.to_string(),
                started.elapsed().as_millis() as u64,
            );
        }
        Err(err) => {
            METRICS.inc_stages_failed();
            emit_stage_failed(kind.name(), &topic_id.to_string(), &err.reason);
        }
    }
    outcome
}
