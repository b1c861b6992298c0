//! End-to-end preprocessing run: load, clean, aggregate, persist.

use std::time::{Duration, Instant};

use crate::aggregate::{SummaryTables, aggregate};
use crate::analytics::{AnalyticsReport, analyze};
use crate::canonical::validate_observed_states;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::loader::{Dataset, DatasetSummary, clean_dataset, load_dataset, summarize};
use crate::persist::{
    ANALYTICS_FILE, ProcessedStore, RunMetadata, build_metadata, write_analytics, write_metadata,
    write_tables,
};
use crate::schema::DatasetKind;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub summaries: Vec<DatasetSummary>,
    pub tables: SummaryTables,
    pub metadata: RunMetadata,
    /// Present when analytics ran eagerly
    pub analytics: Option<AnalyticsReport>,
    pub elapsed: Duration,
}

fn load_clean(kind: DatasetKind, config: &PipelineConfig) -> Result<Dataset> {
    let raw = load_dataset(&kind.source_dir(&config.raw_dir), kind, config)?;
    Ok(clean_dataset(raw))
}

/// Run the whole preprocessing pipeline and write its outputs
///
/// # Errors
/// Fails on any missing, empty or inconsistent source category, and on any
/// write failure. Too few states for analytics is not an error.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome> {
    let start = Instant::now();
    config.validate()?;
    log_operation_start("Preprocessing raw data in", &config.raw_dir);

    let enrolment = load_clean(DatasetKind::Enrolment, config)?;
    let demographic = load_clean(DatasetKind::DemographicUpdate, config)?;
    let biometric = load_clean(DatasetKind::BiometricUpdate, config)?;
    let datasets = [&enrolment, &demographic, &biometric];

    let summaries: Vec<DatasetSummary> = datasets.iter().map(|d| summarize(d)).collect();
    for summary in &summaries {
        log::info!(
            "{}: {} rows, {} states, {} districts",
            summary.kind,
            summary.rows,
            summary.distinct_states,
            summary.distinct_districts
        );
    }

    let observed = datasets
        .iter()
        .flat_map(|d| d.records.iter().map(|r| r.state.as_str()));
    let vocabulary = validate_observed_states(observed);
    if !vocabulary.is_complete() {
        log_warning(
            &format!(
                "Observed states differ from the 36 canonical names; never seen: [{}]",
                vocabulary.missing.join(", ")
            ),
            None,
        );
    }

    let tables = aggregate(&enrolment, &demographic, &biometric, config)?;

    let processed_bytes = write_tables(&config.output_dir, &tables)?;
    let metadata = build_metadata(&datasets, &tables, processed_bytes, config);
    write_metadata(&config.output_dir, &metadata)?;

    let analytics = if config.analytics.eager {
        let report = config
            .thread_pool()?
            .install(|| analyze(&tables.metrics, &config.analytics))?;
        write_analytics(&config.output_dir, &report)?;
        Some(report)
    } else {
        let stale = config.output_dir.join(ANALYTICS_FILE);
        if stale.is_file() {
            std::fs::remove_file(&stale).map_err(|e| PipelineError::io_at(&stale, e))?;
        }
        None
    };

    if processed_bytes >= config.target_processed_bytes {
        log_warning(
            &format!(
                "Processed tables take {processed_bytes} bytes, above the {} byte target",
                config.target_processed_bytes
            ),
            Some(config.output_dir.as_path()),
        );
    }
    log::info!(
        "Processed size {processed_bytes} bytes from {} raw bytes (ratio {:.2})",
        metadata.raw_size_bytes,
        metadata.compression_ratio
    );
    log_operation_complete(
        "wrote",
        &config.output_dir,
        tables.row_counts().iter().map(|(_, n)| n).sum(),
        Some(start.elapsed()),
    );

    Ok(PipelineOutcome {
        summaries,
        tables,
        metadata,
        analytics,
        elapsed: start.elapsed(),
    })
}

/// Run analytics lazily over a persisted metrics table
///
/// Forest fitting runs on a pool of `config.threads` workers.
pub fn analyze_store(store: &ProcessedStore, config: &PipelineConfig) -> Result<AnalyticsReport> {
    let metrics = store.metrics()?;
    config
        .thread_pool()?
        .install(|| analyze(&metrics, &config.analytics))
}
