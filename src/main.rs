//! Command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG` overrides the `info` default).
//! 2. Load [`PipelineConfig`] from `--config`, or from the platform settings
//!    file (defaults when absent).
//! 3. Create the [`tokio`] runtime for batch commands.
//! 4. Run the requested command and print its report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use speech_etl::config::PipelineConfig;
use speech_etl::pipeline::{BatchOrchestrator, CleaningPipeline, FileOutcome};

#[derive(Debug, Parser)]
#[command(name = "speech-etl", version, about = "Quality-gate, clean and featurise speech recordings")]
struct Cli {
    /// Settings file (TOML); defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clean every audio file under INPUT_ROOT into a mirrored OUTPUT_ROOT.
    Clean {
        input_root: PathBuf,
        output_root: PathBuf,
    },
    /// Generate .npy / .png features from cleaned .wav files.
    Features {
        clean_root: PathBuf,
        feature_root: PathBuf,
    },
    /// Clean, then generate features.
    Run {
        input_root: PathBuf,
        output_root: PathBuf,
        /// Where features go; defaults to OUTPUT_ROOT.
        #[arg(long)]
        features_root: Option<PathBuf>,
    },
    /// Clean a single file into DEST_ROOT.
    File {
        input_file: PathBuf,
        dest_root: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            PipelineConfig::default()
        })),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // 2. Configuration
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Clean {
            input_root,
            output_root,
        } => {
            let orchestrator = BatchOrchestrator::new(&config);
            let report = runtime()?.block_on(orchestrator.run(&input_root, &output_root))?;
            println!(
                "accepted: {}  rejected: {}",
                report.accepted_count, report.rejected_count
            );
        }

        Command::Features {
            clean_root,
            feature_root,
        } => {
            let orchestrator = BatchOrchestrator::new(&config);
            let report =
                runtime()?.block_on(orchestrator.run_features(&clean_root, &feature_root))?;
            println!(
                "generated: {}  failed: {}  preview failures: {}",
                report.generated_count, report.failed_count, report.preview_failures
            );
        }

        Command::Run {
            input_root,
            output_root,
            features_root,
        } => {
            let feature_root = features_root.unwrap_or_else(|| output_root.clone());
            let orchestrator = BatchOrchestrator::new(&config);
            let (cleaned, features) = runtime()?.block_on(orchestrator.run_all(
                &input_root,
                &output_root,
                &feature_root,
            ))?;
            println!(
                "accepted: {}  rejected: {}  features: {} ({} failed)",
                cleaned.accepted_count,
                cleaned.rejected_count,
                features.generated_count,
                features.failed_count
            );
        }

        Command::File {
            input_file,
            dest_root,
        } => {
            let bytes = std::fs::read(&input_file)
                .with_context(|| format!("reading {}", input_file.display()))?;
            let file_name = input_file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("invalid file name {}", input_file.display()))?;

            let pipeline = CleaningPipeline::new(&config);
            match pipeline.clean_upload(file_name, bytes, &dest_root)? {
                FileOutcome::Accepted { path, metrics, .. } => println!(
                    "accepted ({:.2}s, {:.1} dB): {}",
                    metrics.duration_secs,
                    metrics.snr_db,
                    path.display()
                ),
                FileOutcome::Rejected(rejection) => println!(
                    "rejected: {} (measured {:.2}, threshold {:.2})",
                    rejection.reason(),
                    rejection.measured(),
                    rejection.threshold()
                ),
            }
        }
    }

    Ok(())
}
