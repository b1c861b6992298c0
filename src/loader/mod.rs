//! Record loading for the three source dataset categories
//!
//! Every file in a category directory is parsed into [`RawRecord`]s, checked
//! against the column contract of its category and deduplicated. Files are
//! parsed in parallel but always combined in sorted path order.

pub mod clean;
pub mod summary;

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::array::{Array, StringArray};
use chrono::NaiveDate;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;
use smallvec::SmallVec;

use crate::config::PipelineConfig;
use crate::error::util::validate_directory;
use crate::error::{PipelineError, Result};
use crate::schema::{
    DatasetKind, DateFormatConfig, SchemaCompatibilityReport, numeric_columns, parse_date_string,
};
use crate::utils::io::{TabularFile, find_source_files, read_tabular_file, string_column};
use crate::utils::logging::{
    create_main_progress_bar, finish_and_clear, log_operation_complete, log_operation_start,
    log_warning,
};

pub use clean::{CleanRecord, Dataset, clean_dataset};
pub use summary::{DatasetSummary, summarize};

/// Inline storage for the numeric cells of a row
pub type Counts = SmallVec<[u64; 4]>;

/// One parsed source row
///
/// `counts` follows the order of [`RawDataset::numeric_columns`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawRecord {
    pub date: Option<NaiveDate>,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub counts: Counts,
}

/// What happened while loading one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Files read, in sorted order
    pub files: Vec<PathBuf>,
    /// Rows read before deduplication
    pub rows_read: usize,
    /// Exact duplicate rows removed
    pub duplicates_removed: usize,
    /// Rows whose date could not be parsed
    pub unparseable_dates: usize,
    /// Numeric cells that were empty
    pub missing_cells: usize,
    /// Numeric cells that were negative or not a number
    pub coerced_cells: usize,
    /// Total size of the source files in bytes
    pub raw_bytes: u64,
}

/// The deduplicated rows of one category
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub kind: DatasetKind,
    pub source_dir: PathBuf,
    /// Normalized header shared by every file
    pub columns: Vec<String>,
    /// Count columns, in header order
    pub numeric_columns: Vec<String>,
    pub records: Vec<RawRecord>,
    pub report: LoadReport,
}

/// Counters gathered while converting one file
#[derive(Debug, Default, Clone, Copy)]
struct CellCounters {
    unparseable_dates: usize,
    missing_cells: usize,
    coerced_cells: usize,
}

impl CellCounters {
    fn merge(&mut self, other: Self) {
        self.unparseable_dates += other.unparseable_dates;
        self.missing_cells += other.missing_cells;
        self.coerced_cells += other.coerced_cells;
    }
}

/// Outcome of parsing one numeric cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Value(u64),
    Missing,
    Coerced,
}

impl Cell {
    const fn value(self) -> u64 {
        match self {
            Self::Value(v) => v,
            Self::Missing | Self::Coerced => 0,
        }
    }
}

/// Parse a count cell; anything that is not a non-negative number that fits
/// in a `u64` becomes 0
fn parse_count(raw: Option<&str>) -> Cell {
    let Some(text) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Cell::Missing;
    };

    if let Ok(v) = text.parse::<u64>() {
        return Cell::Value(v);
    }
    match text.parse::<f64>() {
        // u64::MAX as f64 rounds up to 2^64, which no longer fits
        Ok(v) if v.is_finite() && v >= 0.0 && v < u64::MAX as f64 && v.fract() == 0.0 => {
            Cell::Value(v as u64)
        }
        _ => Cell::Coerced,
    }
}

fn cell<'a>(column: Option<&'a StringArray>, row: usize) -> Option<&'a str> {
    column.and_then(|c| (!c.is_null(row)).then(|| c.value(row)))
}

/// Convert the batches of one file into records
fn convert_file(
    file: &TabularFile,
    numeric: &[String],
    date_config: &DateFormatConfig,
) -> (Vec<RawRecord>, CellCounters) {
    let mut records = Vec::with_capacity(file.num_rows());
    let mut counters = CellCounters::default();

    for batch in &file.batches {
        let date = string_column(batch, "date");
        let state = string_column(batch, "state");
        let district = string_column(batch, "district");
        let pincode = string_column(batch, "pincode");
        let count_columns: Vec<_> = numeric.iter().map(|c| string_column(batch, c)).collect();

        for row in 0..batch.num_rows() {
            let parsed_date = cell(date, row).and_then(|d| parse_date_string(d, date_config));
            if parsed_date.is_none() {
                counters.unparseable_dates += 1;
            }

            let counts: Counts = count_columns
                .iter()
                .map(|column| {
                    let parsed = parse_count(cell(*column, row));
                    match parsed {
                        Cell::Missing => counters.missing_cells += 1,
                        Cell::Coerced => counters.coerced_cells += 1,
                        Cell::Value(_) => {}
                    }
                    parsed.value()
                })
                .collect();

            records.push(RawRecord {
                date: parsed_date,
                state: cell(state, row).unwrap_or_default().trim().to_string(),
                district: cell(district, row).unwrap_or_default().trim().to_string(),
                pincode: cell(pincode, row).unwrap_or_default().trim().to_string(),
                counts,
            });
        }
    }

    (records, counters)
}

/// Remove exact full-row duplicates, keeping the first occurrence
///
/// Returns the number of rows removed.
pub fn deduplicate(records: &mut Vec<RawRecord>) -> usize {
    let before = records.len();
    let keep: Vec<bool> = {
        let mut seen: FxHashSet<&RawRecord> = FxHashSet::default();
        records.iter().map(|r| seen.insert(r)).collect()
    };

    let mut keep = keep.into_iter();
    records.retain(|_| keep.next().unwrap_or(false));
    before - records.len()
}

fn check_schemas(kind: DatasetKind, files: &[TabularFile]) -> Result<()> {
    let Some(first) = files.first() else {
        return Ok(());
    };

    SchemaCompatibilityReport::check_required(kind, &first.columns).into_result(kind, &first.path)?;
    for file in &files[1..] {
        SchemaCompatibilityReport::compare(&first.columns, &file.columns)
            .into_result(kind, &file.path)?;
    }
    Ok(())
}

/// Load every source file of one category
///
/// # Arguments
/// * `dir` - The category directory
/// * `kind` - The category the files belong to
/// * `config` - Pipeline configuration (threads, progress, date formats)
///
/// # Errors
/// Fails on a missing directory, a directory without rows, or files whose
/// columns disagree.
pub fn load_dataset(dir: &Path, kind: DatasetKind, config: &PipelineConfig) -> Result<RawDataset> {
    let start = Instant::now();
    log_operation_start(&format!("Loading {kind} records from"), dir);

    validate_directory(dir, kind.dir_name())?;
    let paths = find_source_files(dir)?;
    if paths.is_empty() {
        return Err(PipelineError::EmptySource {
            category: kind.to_string(),
            path: dir.to_path_buf(),
            reason: "no csv or parquet files".to_string(),
        });
    }

    let pool = config.thread_pool()?;

    let pb = create_main_progress_bar(
        paths.len() as u64,
        Some(&format!("Reading {kind}")),
        config.show_progress,
    );
    let files: Vec<TabularFile> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let file = read_tabular_file(path);
                pb.inc(1);
                file
            })
            .collect::<Result<Vec<_>>>()
    })?;
    finish_and_clear(&pb);

    check_schemas(kind, &files)?;

    let columns = files.first().map(|f| f.columns.clone()).unwrap_or_default();
    let numeric = numeric_columns(&columns);

    let converted: Vec<(Vec<RawRecord>, CellCounters)> = pool.install(|| {
        files
            .par_iter()
            .map(|file| convert_file(file, &numeric, &config.date_format_config))
            .collect()
    });

    let mut report = LoadReport {
        files: paths,
        raw_bytes: files.iter().map(|f| f.bytes).sum(),
        ..LoadReport::default()
    };
    let mut counters = CellCounters::default();
    let mut records = Vec::with_capacity(files.iter().map(TabularFile::num_rows).sum());
    for (file_records, file_counters) in converted {
        counters.merge(file_counters);
        records.extend(file_records);
    }

    report.rows_read = records.len();
    report.unparseable_dates = counters.unparseable_dates;
    report.missing_cells = counters.missing_cells;
    report.coerced_cells = counters.coerced_cells;

    if records.is_empty() {
        return Err(PipelineError::EmptySource {
            category: kind.to_string(),
            path: dir.to_path_buf(),
            reason: "source files contain no rows".to_string(),
        });
    }

    report.duplicates_removed = deduplicate(&mut records);

    if report.unparseable_dates > 0 {
        log_warning(
            &format!("{} {kind} rows have an unparseable date", report.unparseable_dates),
            Some(dir),
        );
    }
    if report.coerced_cells > 0 {
        log_warning(
            &format!(
                "{} {kind} count cells were negative, too large or not numeric and set to 0",
                report.coerced_cells
            ),
            Some(dir),
        );
    }
    log::debug!(
        "{kind}: {} rows read, {} duplicates removed",
        report.rows_read,
        report.duplicates_removed
    );
    log_operation_complete("loaded", dir, records.len(), Some(start.elapsed()));

    Ok(RawDataset {
        kind,
        source_dir: dir.to_path_buf(),
        columns,
        numeric_columns: numeric,
        records,
        report,
    })
}
