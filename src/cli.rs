//! Command-line interface argument parsing.
//!
//! This module handles CLI parsing with clap and layers the flags over the
//! TOML configuration file, when one is given.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use enrolment_pipeline::PipelineConfig;

/// Preprocess regional enrolment and update records into compact summary tables
///
/// Examples:
///   enrolment-pipeline preprocess --raw-dir data/raw --out-dir data/processed
///   enrolment-pipeline preprocess --config pipeline.toml --analytics --seed 7
///   enrolment-pipeline analyze --out-dir data/processed
///   enrolment-pipeline verify --out-dir data/processed --target-bytes 1048576
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load, clean and aggregate the raw data, then write the summary tables
    Preprocess(PreprocessArgs),
    /// Run clustering and regression on a processed metrics table and print JSON
    Analyze(AnalyzeArgs),
    /// Check that every processed output exists and fits the size target
    Verify(VerifyArgs),
}

/// Settings shared by commands that build a configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "ENROLMENT_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Random seed for clustering and the forest
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Number of k-means restarts
    #[arg(long, value_name = "N")]
    pub restarts: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct PreprocessArgs {
    /// Directory holding enrolment/, demographic_update/ and biometric_update/
    #[arg(long, value_name = "DIR")]
    pub raw_dir: Option<PathBuf>,

    /// Directory the processed outputs are written to
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Run analytics at the end and write analytics.json
    #[arg(long)]
    pub analytics: bool,

    /// Number of worker threads
    #[arg(long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Number of top districts labelled urban
    #[arg(long, value_name = "N")]
    pub urban_top_n: Option<usize>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Processed output directory
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Processed output directory
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Size target for the table files, in bytes
    #[arg(long, value_name = "BYTES")]
    pub target_bytes: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "ENROLMENT_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,
}

fn base_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

impl ConfigArgs {
    /// Load the configuration file, if any, and apply the analytics overrides
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = base_config(self.config.as_deref())?;
        if let Some(seed) = self.seed {
            config.analytics.seed = seed;
        }
        if let Some(restarts) = self.restarts {
            config.analytics.n_init = restarts;
        }
        Ok(config)
    }
}

impl PreprocessArgs {
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = self.config.resolve()?;
        if let Some(dir) = &self.raw_dir {
            config.raw_dir.clone_from(dir);
        }
        if let Some(dir) = &self.out_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(n) = self.urban_top_n {
            config.urban_top_n = n;
        }
        if self.analytics {
            config.analytics.eager = true;
        }
        if self.no_progress {
            config.show_progress = false;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

impl AnalyzeArgs {
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = self.config.resolve()?;
        if let Some(dir) = &self.out_dir {
            config.output_dir.clone_from(dir);
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

impl VerifyArgs {
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = base_config(self.config.as_deref())?;
        if let Some(dir) = &self.out_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(bytes) = self.target_bytes {
            config.target_processed_bytes = bytes;
        }
        Ok(config)
    }
}
