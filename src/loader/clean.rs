//! Canonicalization of loaded rows.

use chrono::NaiveDate;

use crate::canonical::{CanonicalState, CanonicalizationStats, classify, clean_text};
use crate::loader::{Counts, LoadReport, RawDataset};
use crate::schema::DatasetKind;
use crate::utils::logging::log_warning;

/// A row whose state is canonical and whose district name is cleaned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    pub date: Option<NaiveDate>,
    pub state: CanonicalState,
    /// `None` when the source cell was blank
    pub district: Option<String>,
    pub pincode: String,
    pub counts: Counts,
}

/// A cleaned dataset ready for aggregation
#[derive(Debug, Clone)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub records: Vec<CleanRecord>,
    pub load: LoadReport,
    pub canonicalization: CanonicalizationStats,
}

impl Dataset {
    /// Position of a count column within [`CleanRecord::counts`]
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.numeric_columns.iter().position(|c| c == name)
    }

    /// Sum of one count column across all rows; zero if the column is absent
    ///
    /// The sum saturates at `u64::MAX`.
    #[must_use]
    pub fn column_total(&self, name: &str) -> u64 {
        self.column_index(name).map_or(0, |idx| {
            self.records
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.counts[idx]))
        })
    }
}

/// Canonicalize the state of every row, dropping rows that cannot be mapped
pub fn clean_dataset(raw: RawDataset) -> Dataset {
    let mut stats = CanonicalizationStats::default();

    let records: Vec<CleanRecord> = raw
        .records
        .into_iter()
        .filter_map(|record| {
            let state = stats.record(classify(&record.state))?;
            let district = clean_text(&record.district);
            Some(CleanRecord {
                date: record.date,
                state,
                district: (!district.is_empty()).then_some(district),
                pincode: record.pincode,
                counts: record.counts,
            })
        })
        .collect();

    if stats.dropped() > 0 {
        log_warning(
            &format!(
                "Dropped {} {} rows with a numeric or empty state and {} with an unknown state {:?}",
                stats.dropped_garbage,
                raw.kind,
                stats.dropped_unknown,
                stats.unknown_samples
            ),
            Some(raw.source_dir.as_path()),
        );
    }
    log::debug!(
        "{}: {} rows kept, {} state names corrected",
        raw.kind,
        stats.kept,
        stats.corrected
    );

    Dataset {
        kind: raw.kind,
        columns: raw.columns,
        numeric_columns: raw.numeric_columns,
        records,
        load: raw.report,
        canonicalization: stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RawRecord;
    use smallvec::smallvec;
    use std::path::PathBuf;

    fn raw(rows: &[(&str, &str)]) -> RawDataset {
        RawDataset {
            kind: DatasetKind::Enrolment,
            source_dir: PathBuf::from("enrolment"),
            columns: vec![],
            numeric_columns: vec!["age_0_5".to_string()],
            records: rows
                .iter()
                .map(|(state, district)| RawRecord {
                    date: None,
                    state: (*state).to_string(),
                    district: (*district).to_string(),
                    pincode: "700001".to_string(),
                    counts: smallvec![1],
                })
                .collect(),
            report: LoadReport::default(),
        }
    }

    #[test]
    fn test_clean_dataset() {
        let dataset = clean_dataset(raw(&[
            ("Westbengal", "  kolkata "),
            ("West Bengal", ""),
            ("123", "Nowhere"),
            ("Atlantis", "Capital"),
        ]));

        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].state.as_str(), "West Bengal");
        assert_eq!(dataset.records[0].district.as_deref(), Some("Kolkata"));
        assert_eq!(dataset.records[1].district, None);
        assert_eq!(dataset.canonicalization.corrected, 1);
        assert_eq!(dataset.canonicalization.dropped_garbage, 1);
        assert_eq!(dataset.canonicalization.dropped_unknown, 1);
        assert_eq!(dataset.column_total("age_0_5"), 2);
        assert_eq!(dataset.column_total("age_5_17"), 0);
    }

    #[test]
    fn test_column_total_saturates() {
        let mut source = raw(&[("Goa", "North Goa"), ("Goa", "South Goa")]);
        for record in &mut source.records {
            record.counts = smallvec![u64::MAX - 1];
        }

        let dataset = clean_dataset(source);
        assert_eq!(dataset.column_total("age_0_5"), u64::MAX);
    }
}
