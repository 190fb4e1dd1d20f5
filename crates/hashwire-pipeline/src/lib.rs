//! Hashwire Pipeline - multi-stage content generation
//!
//! Turns a data snapshot into content packages:
//! - Generates topics from the snapshot
//! - Runs Researcher → Writer → QualityChecker → Repurposer (→ Publisher)
//!   per topic, isolating per-topic failures
//! - Reports progress through a single-slot run registry with cooperative
//!   cancellation

pub mod facts;
pub mod orchestrator;
pub mod package;
pub mod registry;
pub mod sequencer;
pub mod stage;
pub mod stages;
pub mod topic;

// Re-export key types
pub use orchestrator::{
    launch, OrchestratorSettings, PipelineOrchestrator, RunMetadata, RunResult, SnapshotSource,
    StaticSnapshot,
};
pub use package::{
    ContentPackage, Draft, PackageStatus, Platform, PlatformVariant, ResearchBrief, ReviewedDraft,
};
pub use registry::{RunRegistry, RunState, StartOutcome};
pub use sequencer::{BatchOutcome, CancelFlag, ItemLog, ProgressSink, Sequencer, VecSink};
pub use stage::{run_stage, Stage, StageFailed, StageKind};
pub use stages::{Publisher, QualityChecker, Repurposer, Researcher, StageSet, Writer};
pub use topic::{Difficulty, SnapshotTopicGenerator, Topic, TopicCategory, TopicGenerator};
