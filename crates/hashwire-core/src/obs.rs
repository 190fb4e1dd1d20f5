//! Structured observability hooks for aggregation and pipeline lifecycle events.
//!
//! This module provides:
//! - The run-scoped span pipeline runs are instrumented with
//! - Emission functions for key events: metric resolution, extraction
//!   failures, snapshot assembly, run start/finish, stage outcomes
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).
//! For JSON output, pass `--json` to the binaries.

use tracing::{info, warn};

/// The run-scoped span, for instrumenting futures that cross await points.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("hashwire.run", run_id = %run_id)
}

/// Emit event: a metric resolved, after `failed_attempts` rejected providers.
pub fn emit_metric_resolved(metric: &str, provider: &str, failed_attempts: usize) {
    info!(
        event = "metric.resolved",
        metric = %metric,
        provider = %provider,
        failed_attempts = failed_attempts,
    );
}

/// Emit event: every provider in the chain was rejected (warning level).
pub fn emit_metric_unknown(metric: &str, attempts: usize) {
    warn!(event = "metric.unknown", metric = %metric, attempts = attempts);
}

/// Emit event: a KPI could not be extracted from the available evidence.
pub fn emit_extraction_failed(kpi: &str, reason: &str) {
    warn!(event = "extraction.failed", kpi = %kpi, reason = %reason);
}

/// Emit event: a data snapshot was assembled.
pub fn emit_snapshot_built(known: usize, unknown: usize, duration_ms: u64) {
    info!(
        event = "snapshot.built",
        known = known,
        unknown = unknown,
        duration_ms = duration_ms,
    );
}

/// Emit event: pipeline run started.
pub fn emit_run_started(run_id: &str, topics_requested: usize) {
    info!(event = "run.started", run_id = %run_id, topics_requested = topics_requested);
}

/// Emit event: a start request was refused because a run is active.
pub fn emit_run_rejected(active_run_id: &str) {
    info!(event = "run.rejected", active_run_id = %active_run_id);
}

/// Emit event: pipeline run finished.
pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    packages: usize,
    errors: usize,
    success: bool,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        packages = packages,
        errors = errors,
        success = success,
    );
}

/// Emit event: run stopped at a topic boundary after a cancel request.
pub fn emit_run_cancelled(run_id: &str, completed_topics: usize) {
    info!(event = "run.cancelled", run_id = %run_id, completed_topics = completed_topics);
}

/// Emit event: one stage finished for one topic.
pub fn emit_stage_completed(stage: &str, topic_id: &str, duration_ms: u64) {
    info!(
        event = "stage.completed",
        stage = %stage,
        topic_id = %topic_id,
        duration_ms = duration_ms,
    );
}

/// Emit event: a stage failed for one topic (warning level).
pub fn emit_stage_failed(stage: &str, topic_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "stage.failed", stage = %stage, topic_id = %topic_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_metadata() {
        let span = run_span("test-run-id");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "hashwire.run");
        }
    }
}
