//! Error handling for the enrolment pipeline.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors that can occur while loading, aggregating or persisting records
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// IO error tied to a specific path
    #[error("IO error at {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Arrow error while decoding or building record batches
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting between records and Arrow batches
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_arrow::Error),

    /// Error reading or writing JSON documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a configuration file
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dataset category directory does not exist
    #[error("{category} source directory not found: {}", path.display())]
    MissingDirectory { category: String, path: PathBuf },

    /// A dataset category directory holds no usable rows
    #[error("{category} source directory {} is empty: {reason}", path.display())]
    EmptySource {
        category: String,
        path: PathBuf,
        reason: String,
    },

    /// Files within one dataset category disagree on their columns
    #[error(
        "schema mismatch in {category} file {}: missing columns [{}], unexpected columns [{}]",
        file.display(),
        missing.join(", "),
        unexpected.join(", ")
    )]
    SchemaMismatch {
        category: String,
        file: PathBuf,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A processed output expected by a consumer is absent
    #[error("processed output not found: {}; run the preprocessing step first (`enrolment-pipeline preprocess`)", path.display())]
    MissingOutput { path: PathBuf },

    /// Numeric failure inside the analytics engine
    #[error("Analytics error: {0}")]
    Analytics(String),
}

impl PipelineError {
    /// Attach a path to an IO error
    pub fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should be reported with the preprocessing hint
    #[must_use]
    pub const fn is_missing_output(&self) -> bool {
        matches!(self, Self::MissingOutput { .. })
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
