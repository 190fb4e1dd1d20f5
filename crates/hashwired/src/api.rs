//! Transport-agnostic request handlers.
//!
//! | Route | Effect |
//! |-------|--------|
//! | `POST /generate/start` | start a run unless one is active |
//! | `GET /generate/state` | logs so far, `done`, and the result once finished |
//! | `POST /generate/stop` | request cancellation of the active run |
//! | `GET /data/onchain` | freshly resolved on-chain metrics |
//! | `GET /data/comprehensive` | a full data snapshot |
//! | `GET /health` | liveness |

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use content_store::FsContentStore;
use hashwire_core::{DataAggregator, HashwireConfig};
use hashwire_pipeline::{
    launch, OrchestratorSettings, PipelineOrchestrator, RunRegistry, SnapshotTopicGenerator,
    StageSet,
};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

pub struct Api {
    registry: RunRegistry,
    orchestrator: Arc<PipelineOrchestrator>,
    aggregator: Arc<DataAggregator>,
}

impl Api {
    pub fn new(
        registry: RunRegistry,
        orchestrator: Arc<PipelineOrchestrator>,
        aggregator: Arc<DataAggregator>,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            aggregator,
        }
    }

    /// Wire the aggregator, pipeline and content store from configuration.
    ///
    /// Runs share the data endpoints' aggregator, and so its caches.
    pub fn from_config(config: &HashwireConfig) -> Result<Self> {
        let aggregator = Arc::new(
            DataAggregator::from_config(config).context("failed to build data aggregator")?,
        );
        let generator = config
            .text_generator()
            .context("failed to build text generator")?;
        let store = open_store(&config.pipeline.output_dir)?;

        let orchestrator = PipelineOrchestrator::new(
            aggregator.clone(),
            Arc::new(SnapshotTopicGenerator::new()),
            StageSet::standard(generator).with_store(Arc::new(store)),
        )
        .with_settings(OrchestratorSettings::from(&config.pipeline));

        Ok(Self::new(
            RunRegistry::new(),
            Arc::new(orchestrator),
            aggregator,
        ))
    }

    pub async fn handle(&self, method: &str, path: &str) -> ApiResponse {
        let path = path.split('?').next().unwrap_or(path);
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        debug!(method, path, "request");

        let allowed = match path {
            "/generate/start" | "/generate/stop" => "POST",
            "/generate/state" | "/data/onchain" | "/data/comprehensive" | "/health" => "GET",
            _ => return ApiResponse::error(404, format!("no route for {path}")),
        };
        if !method.eq_ignore_ascii_case(allowed) {
            return ApiResponse::error(405, format!("{path} only accepts {allowed}"));
        }

        match path {
            "/generate/start" => self.start(),
            "/generate/stop" => self.stop(),
            "/generate/state" => self.state(),
            "/data/onchain" => self.on_chain().await,
            "/data/comprehensive" => self.comprehensive().await,
            _ => ApiResponse::ok(json!({ "status": "ok" })),
        }
    }

    fn start(&self) -> ApiResponse {
        let outcome = launch(Arc::clone(&self.orchestrator), &self.registry);
        match outcome.into_result() {
            Ok(run_id) => info!(run_id = %run_id, "run started"),
            Err(e) => debug!(error = %e, "start request joined the active run"),
        }
        ApiResponse::ok(json!({
            "started": true,
            "runId": outcome.run_id(),
            "alreadyActive": !outcome.is_started(),
        }))
    }

    fn stop(&self) -> ApiResponse {
        match self.registry.request_cancel() {
            Some(run_id) => {
                info!(run_id = %run_id, "cancellation requested");
                ApiResponse::ok(json!({ "stopping": true, "runId": run_id }))
            }
            None => ApiResponse::ok(json!({ "stopping": false })),
        }
    }

    fn state(&self) -> ApiResponse {
        match self.registry.read_current() {
            Some(state) => match serde_json::to_value(&state) {
                Ok(body) => ApiResponse::ok(body),
                Err(e) => ApiResponse::error(500, format!("failed to encode run state: {e}")),
            },
            None => ApiResponse::ok(json!({ "logs": [], "done": false })),
        }
    }

    async fn on_chain(&self) -> ApiResponse {
        let metrics = self.aggregator.on_chain().await;
        ApiResponse::ok(json!({
            "on_chain": metrics,
            "timestamp": Utc::now(),
        }))
    }

    async fn comprehensive(&self) -> ApiResponse {
        let snapshot = self.aggregator.comprehensive().await;
        match serde_json::to_value(&snapshot) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiResponse::error(500, format!("failed to encode snapshot: {e}")),
        }
    }
}

fn open_store(dir: &Path) -> Result<FsContentStore> {
    FsContentStore::new(dir)
        .with_context(|| format!("failed to open content store at {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashwire_core::fakes::{ScriptedGenerator, StaticProvider, StaticSearch};
    use hashwire_core::{MetricChain, MetricKind};
    use std::time::Duration;

    fn aggregator() -> Arc<DataAggregator> {
        let chains = vec![MetricChain::new(MetricKind::PriceUsd, Duration::from_secs(60))
            .with_provider(Arc::new(StaticProvider::new(
                "static",
                MetricKind::PriceUsd,
                64_000.0,
            )))];
        Arc::new(DataAggregator::new(
            chains,
            Arc::new(StaticSearch::new(vec![])),
            Arc::new(ScriptedGenerator::failing()),
        ))
    }

    fn api() -> Api {
        let aggregator = aggregator();
        let generator = Arc::new(ScriptedGenerator::json(json!({
            "title": "Hashprice check",
            "body": "Miners watch their margins closely this month. ".repeat(20),
        })));
        let orchestrator = PipelineOrchestrator::new(
            aggregator.clone(),
            Arc::new(SnapshotTopicGenerator::new()),
            StageSet::standard(generator),
        )
        .with_settings(OrchestratorSettings {
            topics: 1,
            ..OrchestratorSettings::default()
        });
        Api::new(RunRegistry::new(), Arc::new(orchestrator), aggregator)
    }

    async fn wait_done(api: &Api) -> Value {
        for _ in 0..500 {
            let state = api.handle("GET", "/generate/state").await.body;
            if state["done"] == true {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run never completed");
    }

    #[tokio::test]
    async fn test_state_before_any_run() {
        let response = api().handle("GET", "/generate/state").await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "logs": [], "done": false }));
    }

    #[tokio::test]
    async fn test_start_then_poll_until_done() {
        let api = api();
        let started = api.handle("POST", "/generate/start").await;
        assert_eq!(started.status, 200);
        assert_eq!(started.body["started"], true);
        assert_eq!(started.body["alreadyActive"], false);

        let state = wait_done(&api).await;
        assert_eq!(state["runId"], started.body["runId"]);
        assert_eq!(state["result"]["success"], true);
        assert_eq!(state["result"]["contentPackages"].as_array().unwrap().len(), 1);
        assert_eq!(state["result"]["metadata"]["platformVariants"], 3);
        assert_eq!(state["logs"][0], "Aggregating data snapshot");
    }

    #[tokio::test]
    async fn test_stop_without_active_run() {
        let response = api().handle("POST", "/generate/stop").await;
        assert_eq!(response.body["stopping"], false);
    }

    #[tokio::test]
    async fn test_stop_cancels_active_run() {
        let api = api();
        let id = api.registry.start().run_id();
        let flag = api.registry.cancel_flag(id).unwrap();

        let response = api.handle("POST", "/generate/stop").await;
        assert_eq!(response.body["stopping"], true);
        assert_eq!(response.body["runId"], json!(id));
        assert!(flag.is_cancelled());

        let again = api.handle("POST", "/generate/start").await;
        assert_eq!(again.body["alreadyActive"], true);
        assert_eq!(again.body["runId"], json!(id));
    }

    #[tokio::test]
    async fn test_onchain_reports_known_and_unknown() {
        let response = api().handle("GET", "/data/onchain").await;
        assert_eq!(response.status, 200);
        let metrics = &response.body["on_chain"];
        assert_eq!(metrics["price_usd"]["value"], 64_000.0);
        assert!(metrics["hashrate"]["value"].is_null());
    }

    #[tokio::test]
    async fn test_comprehensive_snapshot_shape() {
        let body = api().handle("GET", "/data/comprehensive/").await.body;
        assert!(body["on_chain"].is_object());
        assert!(body["sustainability"]["metrics"].is_object());
        assert!(body["trends"]["headlines"].as_array().unwrap().is_empty());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let api = api();
        assert_eq!(api.handle("GET", "/nope").await.status, 404);
        assert_eq!(api.handle("GET", "/generate/start").await.status, 405);
        assert_eq!(api.handle("POST", "/data/onchain").await.status, 405);
        assert_eq!(api.handle("GET", "/health?probe=1").await.status, 200);
    }
}
