//! CSV and Parquet file operations
//!
//! This module provides utilities for finding source files in a dataset
//! directory and reading them into Arrow record batches of string columns.

use std::fs;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::compute::cast;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::util::{file_size, safe_open_file};
use crate::error::{PipelineError, Result};
use crate::schema::normalize_column_name;

/// Default batch size for reading source files
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Helper function to get batch size from environment
#[must_use]
pub fn get_batch_size() -> Option<usize> {
    std::env::var("ENROLMENT_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|size| *size > 0)
}

/// On-disk format of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    /// Detect the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// A source file read into string-typed record batches
#[derive(Debug, Clone)]
pub struct TabularFile {
    /// Path of the file
    pub path: PathBuf,
    /// Normalized column names, in file order
    pub columns: Vec<String>,
    /// Record batches whose columns are all `Utf8`
    pub batches: Vec<RecordBatch>,
    /// Size of the file on disk
    pub bytes: u64,
}

impl TabularFile {
    /// Total number of rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Find all CSV and Parquet files directly inside `dir`, in sorted order
pub fn find_source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io_at(dir, e))?;

    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| PipelineError::io_at(dir, e))?;
        let path = entry.path();
        if path.is_file() && SourceFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }

    Ok(files.into_iter().sorted().collect())
}

/// Read a CSV or Parquet file into string-typed record batches
pub fn read_tabular_file(path: &Path) -> Result<TabularFile> {
    let batch_size = get_batch_size().unwrap_or(DEFAULT_BATCH_SIZE);

    let (columns, batches) = match SourceFormat::from_path(path) {
        Some(SourceFormat::Csv) => read_csv(path, batch_size)?,
        Some(SourceFormat::Parquet) => read_parquet(path, batch_size)?,
        None => {
            return Err(PipelineError::io_at(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "unsupported source file extension",
                ),
            ));
        }
    };

    log::debug!(
        "Read {} rows in {} batches from {}",
        batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
        batches.len(),
        path.display()
    );

    Ok(TabularFile {
        path: path.to_path_buf(),
        columns,
        batches,
        bytes: file_size(path),
    })
}

fn string_schema(columns: &[String]) -> Arc<Schema> {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

fn read_csv(path: &Path, batch_size: usize) -> Result<(Vec<String>, Vec<RecordBatch>)> {
    let mut file = safe_open_file(path, "reading csv source file")?;

    // Only the header is needed; every column is read as text
    let (inferred, _) = Format::default()
        .with_header(true)
        .with_truncated_rows(true)
        .infer_schema(&mut file, Some(1))?;
    file.rewind().map_err(|e| PipelineError::io_at(path, e))?;

    let columns: Vec<String> = inferred
        .fields()
        .iter()
        .map(|f| normalize_column_name(f.name()))
        .collect();
    if columns.is_empty() {
        return Ok((columns, Vec::new()));
    }

    let reader = ReaderBuilder::new(string_schema(&columns))
        .with_header(true)
        .with_batch_size(batch_size)
        // short rows load with null trailing cells
        .with_truncated_rows(true)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((columns, batches))
}

fn read_parquet(path: &Path, batch_size: usize) -> Result<(Vec<String>, Vec<RecordBatch>)> {
    let file = safe_open_file(path, "reading parquet source file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| normalize_column_name(f.name()))
        .collect();
    let schema = string_schema(&columns);

    let reader = builder.with_batch_size(batch_size).build()?;
    let mut batches = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let converted: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .map(|col| cast(col, &DataType::Utf8))
            .collect::<std::result::Result<_, _>>()?;
        batches.push(RecordBatch::try_new(Arc::clone(&schema), converted)?);
    }

    Ok((columns, batches))
}

/// Borrow a column of a string-typed batch by name
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    let idx = batch.schema().index_of(name).ok()?;
    batch.column(idx).as_any().downcast_ref::<StringArray>()
}
