//! Pipeline orchestration: snapshot, topics, stages, result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hashwire_core::{
    emit_run_cancelled, emit_run_finished, emit_run_rejected, emit_run_started, run_span,
    DataAggregator, DataSnapshot, PipelineConfig, METRICS,
};
use serde::Serialize;
use tracing::{debug, error, Instrument};
use uuid::Uuid;

use crate::package::ContentPackage;
use crate::registry::{RunRegistry, StartOutcome};
use crate::sequencer::{CancelFlag, ItemLog, ProgressSink, Sequencer};
use crate::stage::{run_stage, StageFailed};
use crate::stages::StageSet;
use crate::topic::{Topic, TopicGenerator};

/// Where a run gets its data snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> DataSnapshot;
}

#[async_trait]
impl SnapshotSource for DataAggregator {
    async fn snapshot(&self) -> DataSnapshot {
        self.comprehensive().await
    }
}

/// A fixed snapshot, reused for every run.
#[derive(Debug, Clone)]
pub struct StaticSnapshot(pub DataSnapshot);

#[async_trait]
impl SnapshotSource for StaticSnapshot {
    async fn snapshot(&self) -> DataSnapshot {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub topics_generated: usize,
    pub content_created: usize,
    pub platform_variants: usize,
    pub duration_ms: u64,
}

/// Final outcome of one run.
///
/// `success` is true when at least one package was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    pub cancelled: bool,
    pub content_packages: Vec<ContentPackage>,
    pub errors: Vec<String>,
    pub metadata: RunMetadata,
}

impl RunResult {
    /// Result for a run that ended without reaching the topic stage.
    pub fn aborted(reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            cancelled: false,
            content_packages: Vec::new(),
            errors: vec![reason.into()],
            metadata: RunMetadata {
                duration_ms,
                ..RunMetadata::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub topics: usize,
    pub concurrency: usize,
    pub stage_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for OrchestratorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            topics: config.topics,
            concurrency: config.concurrency,
            stage_timeout: Duration::from_secs(config.stage_timeout_secs),
        }
    }
}

pub struct PipelineOrchestrator {
    source: Arc<dyn SnapshotSource>,
    topics: Arc<dyn TopicGenerator>,
    stages: StageSet,
    settings: OrchestratorSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        topics: Arc<dyn TopicGenerator>,
        stages: StageSet,
    ) -> Self {
        Self {
            source,
            topics,
            stages,
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Execute one run to completion. Never fails: problems land in `errors`.
    pub async fn run(
        &self,
        run_id: Uuid,
        cancel: CancelFlag,
        sink: Arc<dyn ProgressSink>,
    ) -> RunResult {
        self.run_inner(run_id, cancel, sink)
            .instrument(run_span(&run_id.to_string()))
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        cancel: CancelFlag,
        sink: Arc<dyn ProgressSink>,
    ) -> RunResult {
        let started = Instant::now();
        let run_label = run_id.to_string();
        METRICS.inc_runs_started();
        emit_run_started(&run_label, self.settings.topics);

        sink.log("Aggregating data snapshot".to_string());
        let snapshot = Arc::new(self.source.snapshot().await);
        let unknown = snapshot.unknown_metrics().len();
        sink.log(format!(
            "Snapshot ready: {} known metrics, {} unknown",
            snapshot.known_metrics().count(),
            unknown
        ));

        if cancel.is_cancelled() {
            sink.log("Run cancelled before topic generation".to_string());
            emit_run_cancelled(&run_label, 0);
            return RunResult {
                cancelled: true,
                errors: Vec::new(),
                ..RunResult::aborted("", elapsed_ms(started))
            };
        }

        let topics = match self.topics.generate(snapshot, self.settings.topics).await {
            Ok(topics) => topics,
            Err(e) => {
                let reason = format!("topic generation failed: {e}");
                sink.log(reason.clone());
                let result = RunResult::aborted(reason, elapsed_ms(started));
                emit_run_finished(&run_label, result.metadata.duration_ms, 0, 1, false);
                return result;
            }
        };
        let total = topics.len();
        sink.log(format!("Generated {total} topics"));

        let titles: Vec<String> = topics.iter().map(|t| t.title.clone()).collect();
        let batch = Sequencer::new(cancel)
            .with_concurrency(self.settings.concurrency)
            .run_batch(topics, Arc::clone(&sink), |index, topic, log| {
                self.process_topic(index, total, topic, log)
            })
            .await;

        let errors: Vec<String> = batch
            .failures
            .iter()
            .map(|(index, err)| {
                format!(
                    "Topic {} \"{}\": {} failed: {}",
                    index + 1,
                    titles[*index],
                    err.stage,
                    err.reason
                )
            })
            .collect();
        let content_packages: Vec<ContentPackage> =
            batch.completed.into_iter().map(|(_, pkg)| pkg).collect();
        let platform_variants = content_packages
            .iter()
            .map(|p| p.platform_variants.len())
            .sum();

        let duration_ms = elapsed_ms(started);
        let result = RunResult {
            success: !content_packages.is_empty(),
            cancelled: batch.cancelled,
            metadata: RunMetadata {
                topics_generated: total,
                content_created: content_packages.len(),
                platform_variants,
                duration_ms,
            },
            content_packages,
            errors,
        };

        if result.cancelled {
            sink.log(format!(
                "Run cancelled after {} of {} topics",
                total - batch.skipped,
                total
            ));
            emit_run_cancelled(&run_label, total - batch.skipped);
        }
        sink.log(format!(
            "Run finished: {} packages, {} errors",
            result.content_packages.len(),
            result.errors.len()
        ));
        emit_run_finished(
            &run_label,
            duration_ms,
            result.content_packages.len(),
            result.errors.len(),
            result.success,
        );
        METRICS.flush();
        result
    }

    async fn process_topic(
        &self,
        index: usize,
        total: usize,
        topic: Topic,
        log: ItemLog,
    ) -> Result<ContentPackage, StageFailed> {
        let prefix = format!("[{}/{}]", index + 1, total);
        let topic_id = topic.id;
        let timeout = self.settings.stage_timeout;
        let stages = &self.stages;

        log.push(format!("{prefix} Researching: {}", topic.title));
        let outcome = async {
            let brief = run_stage(stages.researcher.as_ref(), topic, topic_id, timeout).await?;
            log.push(format!("{prefix} Writing"));
            let draft = run_stage(stages.writer.as_ref(), brief, topic_id, timeout).await?;
            log.push(format!("{prefix} Quality checking"));
            let reviewed = run_stage(stages.quality.as_ref(), draft, topic_id, timeout).await?;
            log.push(format!("{prefix} Repurposing"));
            let variants =
                run_stage(stages.repurposer.as_ref(), reviewed.clone(), topic_id, timeout).await?;
            let mut package = ContentPackage::assemble(&reviewed, variants);
            if let Some(publisher) = &stages.publisher {
                log.push(format!("{prefix} Publishing"));
                package = run_stage(publisher.as_ref(), package, topic_id, timeout).await?;
            }
            Ok::<_, StageFailed>(package)
        }
        .await;

        match &outcome {
            Ok(package) => log.push(format!(
                "{prefix} Assembled \"{}\" with {} variants",
                package.title,
                package.platform_variants.len()
            )),
            Err(err) => log.push(format!("{prefix} {} failed: {}", err.stage.activity(), err.reason)),
        }
        outcome
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Start a run in the background unless one is active.
///
/// The run executes on its own task. If that task panics, the run is still
/// completed with `success: false` so pollers always observe `done`.
pub fn launch(orchestrator: Arc<PipelineOrchestrator>, registry: &RunRegistry) -> StartOutcome {
    let outcome = registry.start();
    let run_id = match outcome.into_result() {
        Ok(id) => id,
        Err(err) => {
            emit_run_rejected(&outcome.run_id().to_string());
            debug!(error = %err, "start rejected");
            return outcome;
        }
    };

    let cancel = registry.cancel_flag(run_id).unwrap_or_default();
    let sink = registry.sink(run_id);
    let registry = registry.clone();
    let started = Instant::now();
    tokio::spawn(async move {
        let task = tokio::spawn(async move { orchestrator.run(run_id, cancel, sink).await });
        let result = match task.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(run_id = %run_id, error = %join_err, "pipeline run aborted");
                registry.append_log(run_id, "Run aborted by an internal error");
                RunResult::aborted(
                    format!("internal error: {join_err}"),
                    elapsed_ms(started),
                )
            }
        };
        registry.complete(run_id, result);
    });
    outcome
}
