//! hashwire - one-shot access to the Hashwire aggregator and content pipeline
//!
//! ## Commands
//!
//! - `snapshot`: aggregate and print a data snapshot as JSON
//! - `run`: run the content pipeline once and report the result
//! - `config`: print the effective configuration (secrets omitted)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use content_store::FsContentStore;
use hashwire_core::{
    init_tracing, level_for_verbosity, DataAggregator, HashwireConfig, TextGenerator, METRICS,
};
use hashwire_pipeline::{
    CancelFlag, OrchestratorSettings, PipelineOrchestrator, ProgressSink, RunResult,
    SnapshotTopicGenerator, StageSet,
};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hashwire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bitcoin data aggregation and content pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file (falls back to HASHWIRE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a data snapshot and print it as JSON
    Snapshot {
        /// Only resolve on-chain and market metrics (no search or extraction)
        #[arg(long)]
        onchain_only: bool,
    },

    /// Run the content pipeline once
    Run {
        /// Number of topics to generate
        #[arg(short, long)]
        topics: Option<usize>,

        /// Topics processed at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Persist packages as JSON under this directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        print_json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json, level_for_verbosity(cli.verbose));

    let config =
        HashwireConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Snapshot { onchain_only } => cmd_snapshot(&config, onchain_only).await,
        Commands::Run {
            topics,
            concurrency,
            out,
            print_json,
        } => cmd_run(&config, topics, concurrency, out.as_deref(), print_json).await,
        Commands::Config => cmd_config(&config),
    }
}

async fn cmd_snapshot(config: &HashwireConfig, onchain_only: bool) -> Result<()> {
    let aggregator =
        DataAggregator::from_config(config).context("Failed to build data aggregator")?;
    let rendered = if onchain_only {
        serde_json::to_string_pretty(&aggregator.on_chain().await)?
    } else {
        serde_json::to_string_pretty(&aggregator.comprehensive().await)?
    };
    println!("{rendered}");
    METRICS.flush();
    Ok(())
}

async fn cmd_run(
    config: &HashwireConfig,
    topics: Option<usize>,
    concurrency: Option<usize>,
    out: Option<&Path>,
    print_json: bool,
) -> Result<()> {
    let aggregator = Arc::new(
        DataAggregator::from_config(config).context("Failed to build data aggregator")?,
    );
    let generator = config
        .text_generator()
        .context("Failed to build text generator")?;
    let stages = build_stages(generator, out)?;

    let mut settings = OrchestratorSettings::from(&config.pipeline);
    if let Some(topics) = topics {
        settings.topics = topics;
    }
    if let Some(concurrency) = concurrency {
        settings.concurrency = concurrency;
    }

    let orchestrator = PipelineOrchestrator::new(
        aggregator,
        Arc::new(SnapshotTopicGenerator::new()),
        stages,
    )
    .with_settings(settings);

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current topic");
            on_signal.cancel();
        }
    });

    let run_id = Uuid::new_v4();
    info!(run_id = %run_id, "starting pipeline run");
    let result = orchestrator.run(run_id, cancel, Arc::new(StderrSink)).await;

    if print_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_run_summary(&result));
    }
    if !result.success {
        anyhow::bail!("run produced no content ({} errors)", result.errors.len());
    }
    Ok(())
}

fn cmd_config(config: &HashwireConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

/// Standard stages, publishing to `out` when given.
fn build_stages(generator: Arc<dyn TextGenerator>, out: Option<&Path>) -> Result<StageSet> {
    let stages = StageSet::standard(generator);
    let Some(dir) = out else {
        return Ok(stages);
    };
    let store = FsContentStore::new(dir)
        .with_context(|| format!("Failed to open output directory {:?}", dir))?;
    Ok(stages.with_store(Arc::new(store)))
}

/// Progress lines go to stderr so stdout stays parseable.
struct StderrSink;

impl ProgressSink for StderrSink {
    fn log(&self, line: String) {
        eprintln!("{line}");
    }
}

fn render_run_summary(result: &RunResult) -> String {
    let mut out = String::new();
    let status = match (result.success, result.cancelled) {
        (_, true) => "cancelled",
        (true, false) => "ok",
        (false, false) => "failed",
    };
    out.push_str(&format!(
        "Run {status}: {} of {} topics produced content, {} platform variants in {} ms\n",
        result.metadata.content_created,
        result.metadata.topics_generated,
        result.metadata.platform_variants,
        result.metadata.duration_ms
    ));
    for package in &result.content_packages {
        out.push_str(&format!(
            "  + {} [{}] ({})\n",
            package.title,
            package.content_digest.short(),
            package.id
        ));
    }
    for error in &result.errors {
        out.push_str(&format!("  ! {error}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use hashwire_core::fakes::ScriptedGenerator;
    use hashwire_pipeline::RunMetadata;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::parse_from([
            "hashwire", "run", "--topics", "3", "--out", "content", "-v",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run {
                topics,
                concurrency,
                out,
                print_json,
            } => {
                assert_eq!(topics, Some(3));
                assert_eq!(concurrency, None);
                assert_eq!(out, Some(PathBuf::from("content")));
                assert!(!print_json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_snapshot_flags_parse() {
        let cli = Cli::parse_from(["hashwire", "snapshot", "--onchain-only"]);
        assert!(matches!(
            cli.command,
            Commands::Snapshot { onchain_only: true }
        ));
    }

    #[test]
    fn test_build_stages_with_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("packages");
        let generator = Arc::new(ScriptedGenerator::plain("unused"));

        let stages = build_stages(generator.clone(), Some(&out)).unwrap();
        assert!(stages.publisher.is_some());
        assert!(out.is_dir());

        let stages = build_stages(generator, None).unwrap();
        assert!(stages.publisher.is_none());
    }

    #[test]
    fn test_summary_lists_errors() {
        let result = RunResult {
            success: false,
            cancelled: false,
            content_packages: Vec::new(),
            errors: vec!["Topic 1 \"Hashprice\": writer failed: timed out after 120s".to_string()],
            metadata: RunMetadata {
                topics_generated: 1,
                ..RunMetadata::default()
            },
        };
        let summary = render_run_summary(&result);
        assert!(summary.starts_with("Run failed: 0 of 1 topics"));
        assert!(summary.contains("  ! Topic 1 \"Hashprice\": writer failed"));
    }

    #[test]
    fn test_summary_marks_cancelled() {
        let result = RunResult {
            cancelled: true,
            ..RunResult::aborted("", 5)
        };
        assert!(render_run_summary(&result).starts_with("Run cancelled"));
    }
}
