//! Writing summary tables, run metadata and the analytics report.
//!
//! Every file is written to a hidden sibling first and renamed into place, so
//! a reader never observes a half-written table.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow::datatypes::FieldRef;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::aggregate::{SummaryTable, SummaryTables};
use crate::analytics::AnalyticsReport;
use crate::canonical::{CORRECTIONS_VERSION, CanonicalizationStats};
use crate::config::PipelineConfig;
use crate::error::util::file_size;
use crate::error::{PipelineError, Result};
use crate::loader::Dataset;

/// File name of the run metadata document
pub const METADATA_FILE: &str = "metadata.json";

/// File name of the eagerly computed analytics report
pub const ANALYTICS_FILE: &str = "analytics.json";

/// ZSTD level used for every table
const ZSTD_LEVEL: i32 = 9;

/// Per-dataset section of the metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Rows kept after deduplication and canonicalization
    pub rows: usize,
    pub columns: Vec<String>,
    pub files: usize,
    pub rows_read: usize,
    pub duplicates_removed: usize,
    pub unparseable_dates: usize,
    pub coerced_cells: usize,
    pub raw_size_bytes: u64,
    pub canonicalization: CanonicalizationStats,
}

impl DatasetMetadata {
    #[must_use]
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            rows: dataset.records.len(),
            columns: dataset.columns.clone(),
            files: dataset.load.files.len(),
            rows_read: dataset.load.rows_read,
            duplicates_removed: dataset.load.duplicates_removed,
            unparseable_dates: dataset.load.unparseable_dates,
            coerced_cells: dataset.load.coerced_cells,
            raw_size_bytes: dataset.load.raw_bytes,
            canonicalization: dataset.canonicalization.clone(),
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// UTC timestamp in RFC 3339 form
    pub processed_at: String,
    pub raw_size_bytes: u64,
    pub processed_size_bytes: u64,
    /// `raw_size_bytes / processed_size_bytes`, rounded to two decimals
    pub compression_ratio: f64,
    pub datasets: BTreeMap<String, DatasetMetadata>,
    /// Row count per written table file
    pub processed_files: BTreeMap<String, usize>,
    pub corrections_version: u32,
    pub urban_top_n: usize,
    pub analytics_seed: u64,
    pub analytics_restarts: usize,
}

/// Round a size ratio to two decimals; zero when nothing was written
#[must_use]
pub fn compression_ratio(raw_bytes: u64, processed_bytes: u64) -> f64 {
    if processed_bytes == 0 {
        return 0.0;
    }
    (raw_bytes as f64 / processed_bytes as f64 * 100.0).round() / 100.0
}

fn writer_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(ZSTD_LEVEL)?))
        .build())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `contents` through a temporary sibling, then rename over `path`
fn write_atomically<F>(path: &Path, contents: F) -> Result<()>
where
    F: FnOnce(fs::File) -> Result<()>,
{
    let tmp = temp_path(path);
    let file = fs::File::create(&tmp).map_err(|e| PipelineError::io_at(&tmp, e))?;

    if let Err(e) = contents(file) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| PipelineError::io_at(path, e))
}

/// Write one table as ZSTD-compressed Parquet and return its size in bytes
///
/// # Arguments
/// * `dir` - The output directory
/// * `table` - Which table is written; decides the file name
/// * `rows` - The table rows
pub fn write_table<T>(dir: &Path, table: SummaryTable, rows: &[T]) -> Result<u64>
where
    T: Serialize + DeserializeOwned,
{
    let path = dir.join(table.file_name());
    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())?;
    let batch = serde_arrow::to_record_batch(&fields, &rows)?;
    let props = writer_properties()?;

    write_atomically(&path, |file| {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })?;

    let bytes = file_size(&path);
    log::debug!("Wrote {} rows to {} ({bytes} bytes)", rows.len(), path.display());
    Ok(bytes)
}

/// Write all five tables; returns the total size in bytes
pub fn write_tables(dir: &Path, tables: &SummaryTables) -> Result<u64> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io_at(dir, e))?;

    let mut total = 0;
    for table in SummaryTable::ALL {
        total += match table {
            SummaryTable::StateCompliance => write_table(dir, table, &tables.compliance)?,
            SummaryTable::StateGeography => write_table(dir, table, &tables.geography)?,
            SummaryTable::DistrictVolumes => write_table(dir, table, &tables.districts)?,
            SummaryTable::StateUrbanRural => write_table(dir, table, &tables.urban_rural)?,
            SummaryTable::StateMetrics => write_table(dir, table, &tables.metrics)?,
        };
    }
    Ok(total)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomically(path, |file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    })
}

/// Assemble the metadata document for a finished run
#[must_use]
pub fn build_metadata(
    datasets: &[&Dataset],
    tables: &SummaryTables,
    processed_size_bytes: u64,
    config: &PipelineConfig,
) -> RunMetadata {
    let raw_size_bytes = datasets.iter().map(|d| d.load.raw_bytes).sum();

    RunMetadata {
        processed_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        raw_size_bytes,
        processed_size_bytes,
        compression_ratio: compression_ratio(raw_size_bytes, processed_size_bytes),
        datasets: datasets
            .iter()
            .map(|d| (d.kind.to_string(), DatasetMetadata::from_dataset(d)))
            .collect(),
        processed_files: SummaryTable::ALL
            .iter()
            .map(|t| (t.file_name(), tables.row_count(*t)))
            .collect(),
        corrections_version: CORRECTIONS_VERSION,
        urban_top_n: config.urban_top_n,
        analytics_seed: config.analytics.seed,
        analytics_restarts: config.analytics.n_init,
    }
}

/// Write `metadata.json`
pub fn write_metadata(dir: &Path, metadata: &RunMetadata) -> Result<()> {
    write_json(&dir.join(METADATA_FILE), metadata)
}

/// Write `analytics.json`
pub fn write_analytics(dir: &Path, report: &AnalyticsReport) -> Result<()> {
    write_json(&dir.join(ANALYTICS_FILE), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DistrictVolumeRecord;

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio(1000, 300), 3.33);
        assert_eq!(compression_ratio(10, 0), 0.0);
    }

    #[test]
    fn test_write_table_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![DistrictVolumeRecord {
            rank: 1,
            district: "Kolkata".to_string(),
            total_enroll: 35,
            is_urban: true,
        }];

        let bytes = write_table(dir.path(), SummaryTable::DistrictVolumes, &rows).unwrap();
        assert!(bytes > 0);

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["district_volumes.parquet"]);
    }

    #[test]
    fn test_empty_table_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<DistrictVolumeRecord> = Vec::new();
        write_table(dir.path(), SummaryTable::DistrictVolumes, &rows).unwrap();
        assert!(dir.path().join("district_volumes.parquet").is_file());
    }
}
