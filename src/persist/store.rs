//! Read-only access to a processed output directory.
//!
//! This is the only surface consumers use. Any absent file surfaces as
//! [`PipelineError::MissingOutput`], whose message tells the user to run the
//! preprocessing step first.

use std::fs;
use std::path::PathBuf;

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::de::DeserializeOwned;

use crate::aggregate::{
    DistrictVolumeRecord, StateComplianceRecord, StateGeographyRecord, StateMetricsRecord,
    StateUrbanRuralRecord, SummaryTable,
};
use crate::analytics::AnalyticsReport;
use crate::error::util::safe_open_file;
use crate::error::{PipelineError, Result};
use crate::persist::writer::{ANALYTICS_FILE, METADATA_FILE, RunMetadata};

/// A processed output directory
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    dir: PathBuf,
}

impl ProcessedStore {
    /// Open an output directory
    ///
    /// # Errors
    /// Returns `MissingOutput` if the directory does not exist
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(PipelineError::MissingOutput { path: dir });
        }
        Ok(Self { dir })
    }

    fn existing(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PipelineError::MissingOutput { path })
        }
    }

    /// Read any table into its record type
    pub fn read_table<T: DeserializeOwned>(&self, table: SummaryTable) -> Result<Vec<T>> {
        let path = self.existing(&table.file_name())?;
        let file = safe_open_file(&path, "reading processed table")?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut rows = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            rows.extend(serde_arrow::from_record_batch::<Vec<T>>(&batch)?);
        }
        Ok(rows)
    }

    pub fn compliance(&self) -> Result<Vec<StateComplianceRecord>> {
        self.read_table(SummaryTable::StateCompliance)
    }

    pub fn geography(&self) -> Result<Vec<StateGeographyRecord>> {
        self.read_table(SummaryTable::StateGeography)
    }

    pub fn districts(&self) -> Result<Vec<DistrictVolumeRecord>> {
        self.read_table(SummaryTable::DistrictVolumes)
    }

    pub fn urban_rural(&self) -> Result<Vec<StateUrbanRuralRecord>> {
        self.read_table(SummaryTable::StateUrbanRural)
    }

    pub fn metrics(&self) -> Result<Vec<StateMetricsRecord>> {
        self.read_table(SummaryTable::StateMetrics)
    }

    /// Read `metadata.json`
    pub fn metadata(&self) -> Result<RunMetadata> {
        let path = self.existing(METADATA_FILE)?;
        let content = fs::read_to_string(&path).map_err(|e| PipelineError::io_at(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read `analytics.json`, present only when analytics ran eagerly
    pub fn analytics(&self) -> Result<AnalyticsReport> {
        let path = self.existing(ANALYTICS_FILE)?;
        let content = fs::read_to_string(&path).map_err(|e| PipelineError::io_at(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::writer::write_table;

    #[test]
    fn test_missing_directory_hints_preprocessing() {
        let err = ProcessedStore::open("/no/such/processed/dir").unwrap_err();
        assert!(err.is_missing_output());
        assert!(err.to_string().contains("run the preprocessing step first"));
    }

    #[test]
    fn test_missing_table_hints_preprocessing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::open(dir.path()).unwrap();
        let err = store.metrics().unwrap_err();
        assert!(err.is_missing_output());
        assert!(err.to_string().contains("state_metrics_full.parquet"));
        assert!(store.metadata().unwrap_err().is_missing_output());
    }

    #[test]
    fn test_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            StateUrbanRuralRecord {
                state: "Kerala".to_string(),
                total_enroll: 51,
                urban_districts: 1,
                urban_pct: 1.0 / 52.0,
            },
            StateUrbanRuralRecord {
                state: "Goa".to_string(),
                total_enroll: 0,
                urban_districts: 0,
                urban_pct: 0.0,
            },
        ];
        write_table(dir.path(), SummaryTable::StateUrbanRural, &rows).unwrap();

        let store = ProcessedStore::open(dir.path()).unwrap();
        assert_eq!(store.urban_rural().unwrap(), rows);
    }
}
