//! Checks that a processed directory is complete and within its size target.

use std::path::Path;

use serde::Serialize;

use crate::aggregate::SummaryTable;
use crate::error::util::file_size;
use crate::persist::store::ProcessedStore;
use crate::persist::writer::METADATA_FILE;
use crate::utils::logging::log_warning;

/// One expected output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedFile {
    pub name: String,
    /// Size on disk; `None` when the file is missing
    pub bytes: Option<u64>,
}

/// Outcome of [`verify_outputs`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub files: Vec<VerifiedFile>,
    /// Combined size of the table files
    pub total_bytes: u64,
    pub target_bytes: u64,
    /// Ratio recorded in the metadata, if it could be read
    pub compression_ratio: Option<f64>,
}

impl VerificationReport {
    #[must_use]
    pub fn all_present(&self) -> bool {
        self.files.iter().all(|f| f.bytes.is_some())
    }

    #[must_use]
    pub const fn within_target(&self) -> bool {
        self.total_bytes < self.target_bytes
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.all_present() && self.within_target()
    }

    /// Names of the expected files that are absent
    #[must_use]
    pub fn missing(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| f.bytes.is_none())
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Inspect an output directory
///
/// Never fails: a missing directory yields a report with every file missing.
#[must_use]
pub fn verify_outputs(dir: &Path, target_bytes: u64) -> VerificationReport {
    let expected = SummaryTable::ALL
        .iter()
        .map(|t| t.file_name())
        .chain(std::iter::once(METADATA_FILE.to_string()));

    let files: Vec<VerifiedFile> = expected
        .map(|name| {
            let path = dir.join(&name);
            let bytes = path.is_file().then(|| file_size(&path));
            VerifiedFile { name, bytes }
        })
        .collect();

    let total_bytes = files
        .iter()
        .filter(|f| f.name.ends_with(".parquet"))
        .filter_map(|f| f.bytes)
        .sum();

    let compression_ratio = ProcessedStore::open(dir)
        .and_then(|store| store.metadata())
        .map(|m| m.compression_ratio)
        .ok();

    let report = VerificationReport {
        files,
        total_bytes,
        target_bytes,
        compression_ratio,
    };
    if !report.all_present() {
        log_warning(
            &format!("Missing processed outputs: {}", report.missing().join(", ")),
            Some(dir),
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_empty_directory_reports_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let report = verify_outputs(dir.path(), 1024);
        assert_eq!(report.missing().len(), 6);
        assert!(!report.passed());
        assert_eq!(report.compression_ratio, None);
    }

    #[test]
    fn test_size_target() {
        let dir = tempfile::tempdir().unwrap();
        for table in SummaryTable::ALL {
            fs::write(dir.path().join(table.file_name()), vec![0u8; 100]).unwrap();
        }
        fs::write(dir.path().join(METADATA_FILE), "{}").unwrap();

        let report = verify_outputs(dir.path(), 1024);
        assert!(report.all_present());
        assert_eq!(report.total_bytes, 500);
        assert!(report.passed());

        let report = verify_outputs(dir.path(), 500);
        assert!(!report.within_target());
    }
}
