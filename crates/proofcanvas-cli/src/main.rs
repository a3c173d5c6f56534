//! ProofCanvas CLI
//!
//! Two entry points around the snapshot pipeline:
//! - `generate`: collect workspace documents, synthesize, validate, write artifacts
//! - `check`: re-validate the artifacts already on disk and report staleness

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use proofcanvas_ingest::{NotionClient, NotionConfig, SourcesConfig};
use proofcanvas_llm::{AnthropicClient, LlmConfig};
use proofcanvas_snapshot::{
    check_artifacts, run_pipeline, ArtifactPaths, CheckReport, PipelineConfig, PipelineOutcome,
    SnapshotError, DEFAULT_OUTPUT_DIR,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_SOURCES_CONFIG: &str = "config/komfi-notion-sources.json";

#[derive(Parser)]
#[command(name = "proofcanvas")]
#[command(
    author,
    version,
    about = "ProofCanvas: evidence-grounded investor snapshot generator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the snapshot from the configured workspace pages and write it
    Generate {
        /// Source configuration (JSON)
        #[arg(long, default_value = DEFAULT_SOURCES_CONFIG)]
        config: PathBuf,

        /// Directory receiving the snapshot, sources manifest and meta files
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        out_dir: PathBuf,
    },

    /// Re-validate previously written artifacts (staleness is only a warning)
    Check {
        /// Directory holding the artifacts
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        out_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    // A missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Generate { config, out_dir } => cmd_generate(&config, &out_dir),
        Commands::Check { out_dir } => cmd_check(&out_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<SnapshotError>() {
        Some(SnapshotError::Validation(violations)) => {
            eprintln!("{} snapshot validation failed:", "error:".red().bold());
            for line in violation_lines(violations) {
                eprintln!("{line}");
            }
        }
        _ => eprintln!("{} {err:#}", "error:".red().bold()),
    }
}

fn violation_lines(violations: &[String]) -> Vec<String> {
    violations.iter().map(|v| format!("- {v}")).collect()
}

// ============================================================================
// generate
// ============================================================================

fn cmd_generate(config_path: &Path, out_dir: &Path) -> Result<()> {
    let sources = SourcesConfig::load(config_path)
        .with_context(|| format!("loading sources from {}", config_path.display()))?;
    let store = NotionClient::new(NotionConfig::from_env()?)?;
    let model = AnthropicClient::new(LlmConfig::from_env()?)?;
    let config = PipelineConfig::new(sources, ArtifactPaths::in_dir(out_dir));

    eprintln!(
        "{} {} source(s) from {}",
        "Collecting".green().bold(),
        config.sources.sources.len(),
        config_path.display()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;
    let outcome = rt.block_on(run_pipeline(&store, &model, &config, Utc::now()))?;

    for line in generate_summary(&outcome, &config.paths) {
        println!("{line}");
    }
    Ok(())
}

fn generate_summary(outcome: &PipelineOutcome, paths: &ArtifactPaths) -> Vec<String> {
    let meta = &outcome.artifacts.meta;
    let mut lines = vec![
        format!(
            "{} wrote {}",
            "ok".green().bold(),
            paths.snapshot().display().to_string().bold()
        ),
        format!("  {} {}", "→".yellow(), paths.sources().display()),
        format!("  {} {}", "→".yellow(), paths.meta().display()),
        format!("Generated at: {}", meta.generated_at),
        format!("Sources: {}", meta.source_count),
        format!("Checksum: {}", meta.checksum),
    ];
    if !outcome.report.is_empty() {
        lines.push(format!(
            "{} normalization repaired {} field(s)",
            "info:".yellow().bold(),
            outcome.report.repairs.len()
        ));
    }
    lines
}

// ============================================================================
// check
// ============================================================================

fn cmd_check(out_dir: &Path) -> Result<()> {
    let report = check_artifacts(&ArtifactPaths::in_dir(out_dir), Utc::now())?;
    for line in check_summary(&report) {
        println!("{line}");
    }
    for warning in &report.warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
    Ok(())
}

fn check_summary(report: &CheckReport) -> Vec<String> {
    let age = match report.age_days {
        Some(days) => format!("{days} day(s)"),
        None => "unknown (unparsable generatedAt)".to_string(),
    };
    vec![
        format!("Snapshot schema: {}", "OK".green().bold()),
        format!("Sources in manifest: {}", report.source_count),
        format!("Snapshot age: {age}"),
        format!("Stale threshold: {} day(s)", report.stale_after_days),
    ]
}
