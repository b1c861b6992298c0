//! Preprocessing pipeline for regional enrolment and update records.
//!
//! Raw enrolment, demographic update and biometric update files are loaded,
//! their region names canonicalized and their rows deduplicated. Five summary
//! tables are derived and written as compressed Parquet alongside a metadata
//! document. An analytics engine clusters states and regresses compliance on
//! the combined metrics table.

pub mod aggregate;
pub mod analytics;
pub mod canonical;
pub mod config;
pub mod error;
pub mod loader;
pub mod persist;
pub mod pipeline;
pub mod schema;
pub mod utils;

// Core types
pub use config::{AnalyticsConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use schema::{DatasetKind, SchemaCompatibilityReport, SchemaIssue};

// Stages
pub use aggregate::{SummaryTable, SummaryTables, aggregate};
pub use analytics::{AnalyticsReport, AnalyticsStatus, analyze};
pub use canonical::{CanonicalState, canonicalize};
pub use loader::{Dataset, RawDataset, clean_dataset, load_dataset};
pub use persist::{ProcessedStore, RunMetadata, VerificationReport, verify_outputs};
pub use pipeline::{PipelineOutcome, analyze_store, run};
