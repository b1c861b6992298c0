//! Configuration for the pipeline and the analytics engine.
//!
//! Both structs load from TOML; any key left out keeps its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::schema::DateFormatConfig;

/// Configuration for one preprocessing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding `enrolment/`, `demographic_update/` and `biometric_update/`
    pub raw_dir: PathBuf,
    /// Directory the summary tables and metadata are written to
    pub output_dir: PathBuf,
    /// Number of districts, ranked by enrolment, labelled urban
    pub urban_top_n: usize,
    /// Worker threads for file parsing and forest fitting
    pub threads: usize,
    /// Show progress bars while loading
    pub show_progress: bool,
    /// Processed-size target checked by the verifier, in bytes
    pub target_processed_bytes: u64,
    /// Date format configuration for the `date` column
    pub date_format_config: DateFormatConfig,
    /// Analytics settings
    pub analytics: AnalyticsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/processed"),
            urban_top_n: 50,
            threads: num_cpus::get(),
            show_progress: true,
            target_processed_bytes: 1024 * 1024,
            date_format_config: DateFormatConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for constructing a pipeline configuration
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io_at(path, e))?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.urban_top_n == 0 {
            return Err(PipelineError::Config(
                "urban_top_n must be at least 1".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(PipelineError::Config("threads must be at least 1".to_string()));
        }
        self.analytics.validate()
    }

    /// Build a rayon pool sized by `threads` for the parallel stages
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build thread pool: {e}")))
    }
}

/// Builder for constructing a pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Set the raw data root
    #[must_use]
    pub fn raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.raw_dir = dir.into();
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Set the size of the urban district set
    #[must_use]
    pub const fn urban_top_n(mut self, n: usize) -> Self {
        self.config.urban_top_n = n;
        self
    }

    /// Set the number of worker threads
    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Set whether progress bars are drawn
    #[must_use]
    pub const fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    /// Set the analytics configuration
    #[must_use]
    pub fn analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.config.analytics = analytics;
        self
    }

    /// Build the pipeline configuration
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// Settings for correlation, clustering and regression
///
/// Changing `seed` or `n_init` can permute cluster labels between runs; it
/// does not change the quality of the partition that is reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Run analytics at the end of preprocessing instead of on demand
    pub eager: bool,
    /// Rows required before clustering and regression are attempted
    pub min_rows: usize,
    /// Number of clusters
    pub n_clusters: usize,
    /// Random seed shared by k-means seeding and the forest
    pub seed: u64,
    /// Number of k-means restarts; the lowest-inertia run wins
    pub n_init: usize,
    /// Lloyd iterations per restart
    pub max_iter: usize,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Trees in the random forest
    pub n_estimators: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            eager: false,
            min_rows: 4,
            n_clusters: 4,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            n_estimators: 100,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 || self.n_init == 0 || self.max_iter == 0 || self.n_estimators == 0
        {
            return Err(PipelineError::Config(
                "n_clusters, n_init, max_iter and n_estimators must be positive".to_string(),
            ));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(PipelineError::Config(
                "tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            raw_dir = "/tmp/raw"
            urban_top_n = 10

            [analytics]
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.raw_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(config.urban_top_n, 10);
        assert_eq!(config.analytics.seed, 7);
        assert_eq!(config.analytics.n_init, 10);
        assert_eq!(config.analytics.n_clusters, 4);
        assert_eq!(config.output_dir, PathBuf::from("data/processed"));
    }

    #[test]
    fn test_validate_rejects_zero_urban_set() {
        let config = PipelineConfig::builder().urban_top_n(0).build();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::builder()
            .raw_dir("in")
            .output_dir("out")
            .threads(2)
            .show_progress(false)
            .build();
        assert_eq!(config.raw_dir, PathBuf::from("in"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.threads, 2);
        assert!(!config.show_progress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_thread_pool_follows_config() {
        let config = PipelineConfig::builder().threads(3).build();
        let pool = config.thread_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);
    }
}
