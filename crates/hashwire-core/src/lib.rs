//! Hashwire Core Library
//!
//! Bitcoin data aggregation: provider fallback chains, two-tier caching,
//! evidence extraction from web documents, and snapshot assembly.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod domain;
pub mod evidence;
pub mod fakes;
pub mod fallback;
pub mod metrics;
pub mod obs;
pub mod providers;
pub mod telemetry;
pub mod textgen;

pub use aggregator::{hashprice, keywords, AggregatorSettings, DataAggregator};

pub use cache::{CachedResolver, MonthKey, MonthlyCache, TtlCache};

pub use config::{
    CacheConfig, GeneratorConfig, HashwireConfig, HttpConfig, PipelineConfig, ProviderEndpoints,
    SearchConfig, ServerConfig,
};

pub use domain::{
    site_of, DataSnapshot, ErrorKind, EvidenceDocument, EvidenceSource, HashwireError, Metric,
    MetricKind, Result, SanityBounds, SustainabilitySnapshot, TrendSignal, TrendSnapshot,
};

pub use evidence::{
    BravePlan, BraveSearchClient, BraveSearchConfig, DisabledSearch, EvidenceExtractor,
    EvidenceSearch, ExtractedValue, ExtractionMethod, ExtractionReport, Kpi, SearchError,
    SearchRequest,
};

pub use fallback::{
    AttemptFailure, FallbackResolver, MetricChain, Normalizer, Resolution, DEFAULT_CALL_TIMEOUT,
};

pub use providers::catalog::ProviderCatalog;
pub use providers::derived::DerivedHashrateProvider;
pub use providers::http::HttpMetricProvider;
pub use providers::{ProviderClient, ProviderError};

pub use textgen::{
    DisabledGenerator, GenerationParams, OpenAiCompatClient, OpenAiCompatConfig, TextGenError,
    TextGenerator, TextResult,
};

pub use metrics::METRICS;
pub use obs::{
    emit_extraction_failed, emit_metric_resolved, emit_metric_unknown, emit_run_cancelled,
    emit_run_finished, emit_run_rejected, emit_run_started, emit_snapshot_built,
    emit_stage_completed, emit_stage_failed, run_span,
};
pub use telemetry::{init_tracing, level_for_verbosity};
