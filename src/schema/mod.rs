//! Column contracts for the three source dataset categories and the checks
//! that keep files within a category consistent with each other.

pub mod date;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub use date::{DateFormatConfig, detect_date_format, parse_date_string};

/// Columns every source row carries regardless of category
pub const BASE_COLUMNS: [&str; 4] = ["date", "state", "district", "pincode"];

/// Header spellings accepted in place of the canonical column name
const COLUMN_ALIASES: [(&str, &str); 2] = [
    ("age_18_plus", "age_18_greater"),
    ("age_18+", "age_18_greater"),
];

/// The three families of source records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Enrolment,
    DemographicUpdate,
    BiometricUpdate,
}

impl DatasetKind {
    pub const ALL: [Self; 3] = [
        Self::Enrolment,
        Self::DemographicUpdate,
        Self::BiometricUpdate,
    ];

    /// Directory name of this category below the raw data root
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Enrolment => "enrolment",
            Self::DemographicUpdate => "demographic_update",
            Self::BiometricUpdate => "biometric_update",
        }
    }

    /// Numeric columns the aggregation relies on for this category
    #[must_use]
    pub const fn required_numeric_columns(self) -> &'static [&'static str] {
        match self {
            Self::Enrolment => &["age_0_5", "age_5_17", "age_18_greater"],
            Self::DemographicUpdate => &[],
            Self::BiometricUpdate => &["bio_age_5_17"],
        }
    }

    /// Directory for this category below `raw_root`
    #[must_use]
    pub fn source_dir(self, raw_root: &Path) -> PathBuf {
        raw_root.join(self.dir_name())
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Normalize a header name: trimmed, lower-case, aliases resolved
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map_or(lowered, |(_, canonical)| (*canonical).to_string())
}

/// A struct that represents the compatibility between source file schemas
#[derive(Debug, Default)]
pub struct SchemaCompatibilityReport {
    /// Whether all schemas are compatible
    pub compatible: bool,
    /// List of incompatibility issues, if any
    pub issues: Vec<SchemaIssue>,
}

/// A schema compatibility issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    /// A column present in the reference (or required) is absent
    MissingColumn(String),
    /// A column that the reference file does not carry
    UnexpectedColumn(String),
}

impl SchemaCompatibilityReport {
    /// Compare a file's columns against the reference columns of its category
    ///
    /// Column order is irrelevant; names are compared after normalization.
    #[must_use]
    pub fn compare(reference: &[String], columns: &[String]) -> Self {
        let mut issues: Vec<SchemaIssue> = reference
            .iter()
            .filter(|c| !columns.contains(c))
            .map(|c| SchemaIssue::MissingColumn(c.clone()))
            .collect();
        issues.extend(
            columns
                .iter()
                .filter(|c| !reference.contains(c))
                .map(|c| SchemaIssue::UnexpectedColumn(c.clone())),
        );

        Self {
            compatible: issues.is_empty(),
            issues,
        }
    }

    /// Check that the columns satisfy the contract of a category
    #[must_use]
    pub fn check_required(kind: DatasetKind, columns: &[String]) -> Self {
        let issues: Vec<SchemaIssue> = BASE_COLUMNS
            .iter()
            .chain(kind.required_numeric_columns())
            .filter(|c| !columns.iter().any(|col| col == *c))
            .map(|c| SchemaIssue::MissingColumn((*c).to_string()))
            .collect();

        Self {
            compatible: issues.is_empty(),
            issues,
        }
    }

    /// Turn an incompatible report into the fatal loader error
    pub fn into_result(self, kind: DatasetKind, file: &Path) -> crate::Result<()> {
        if self.compatible {
            return Ok(());
        }

        let mut missing = Vec::new();
        let mut unexpected = Vec::new();
        for issue in self.issues {
            match issue {
                SchemaIssue::MissingColumn(c) => missing.push(c),
                SchemaIssue::UnexpectedColumn(c) => unexpected.push(c),
            }
        }

        Err(PipelineError::SchemaMismatch {
            category: kind.to_string(),
            file: file.to_path_buf(),
            missing,
            unexpected,
        })
    }
}

/// Split a normalized header into the numeric columns of a category
///
/// Everything that is not a base column is treated as a count column.
#[must_use]
pub fn numeric_columns(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| !BASE_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name(" State "), "state");
        assert_eq!(normalize_column_name("age_18_plus"), "age_18_greater");
    }

    #[test]
    fn test_compare_reports_named_columns() {
        let reference = cols(&["date", "state", "district", "pincode", "age_0_5"]);
        let other = cols(&["date", "state", "district", "pincode", "age_0_6"]);

        let report = SchemaCompatibilityReport::compare(&reference, &other);
        assert!(!report.compatible);
        assert_eq!(
            report.issues,
            vec![
                SchemaIssue::MissingColumn("age_0_5".to_string()),
                SchemaIssue::UnexpectedColumn("age_0_6".to_string()),
            ]
        );

        let err = report
            .into_result(DatasetKind::Enrolment, Path::new("b.csv"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("age_0_5"));
        assert!(message.contains("age_0_6"));
        assert!(message.contains("enrolment"));
    }

    #[test]
    fn test_compare_ignores_order() {
        let reference = cols(&["date", "state", "district", "pincode"]);
        let other = cols(&["state", "date", "pincode", "district"]);
        assert!(SchemaCompatibilityReport::compare(&reference, &other).compatible);
    }

    #[test]
    fn test_check_required_biometric() {
        let columns = cols(&["date", "state", "district", "pincode", "bio_age_17_"]);
        let report =
            SchemaCompatibilityReport::check_required(DatasetKind::BiometricUpdate, &columns);
        assert_eq!(
            report.issues,
            vec![SchemaIssue::MissingColumn("bio_age_5_17".to_string())]
        );
    }

    #[test]
    fn test_numeric_columns() {
        let columns = cols(&["date", "state", "district", "pincode", "demo_age_5_17"]);
        assert_eq!(numeric_columns(&columns), cols(&["demo_age_5_17"]));
    }
}
