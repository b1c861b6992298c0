//! Quick profile of a cleaned dataset, logged after each load.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::loader::Dataset;
use crate::schema::DatasetKind;

/// Row, column and cardinality counts for one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub kind: DatasetKind,
    pub rows: usize,
    pub columns: usize,
    pub distinct_states: usize,
    pub distinct_districts: usize,
    pub distinct_pincodes: usize,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    /// Rows without a parseable date
    pub null_dates: usize,
    /// Rows whose pincode is not exactly six digits
    pub invalid_pincodes: usize,
    /// Sum of each count column, in column order
    pub column_totals: Vec<(String, u64)>,
}

fn is_valid_pincode(pincode: &str) -> bool {
    pincode.len() == 6 && pincode.bytes().all(|b| b.is_ascii_digit())
}

/// Profile a cleaned dataset
#[must_use]
pub fn summarize(dataset: &Dataset) -> DatasetSummary {
    let mut states = FxHashSet::default();
    let mut districts = FxHashSet::default();
    let mut pincodes = FxHashSet::default();
    let mut null_dates = 0;
    let mut invalid_pincodes = 0;

    for record in &dataset.records {
        states.insert(record.state);
        if let Some(district) = &record.district {
            districts.insert(district.as_str());
        }
        pincodes.insert(record.pincode.as_str());
        if record.date.is_none() {
            null_dates += 1;
        }
        if !is_valid_pincode(&record.pincode) {
            invalid_pincodes += 1;
        }
    }

    let dates = dataset.records.iter().filter_map(|r| r.date);

    DatasetSummary {
        kind: dataset.kind,
        rows: dataset.records.len(),
        columns: dataset.columns.len(),
        distinct_states: states.len(),
        distinct_districts: districts.len(),
        distinct_pincodes: pincodes.len(),
        date_min: dates.clone().min(),
        date_max: dates.max(),
        null_dates,
        invalid_pincodes,
        column_totals: dataset
            .numeric_columns
            .iter()
            .map(|c| (c.clone(), dataset.column_total(c)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::canonical::CanonicalizationStats;
    use crate::loader::{CleanRecord, LoadReport};
    use smallvec::smallvec;

    #[test]
    fn test_summarize() {
        let record = |state: &str, district: Option<&str>, pincode: &str, day: Option<u32>| {
            CleanRecord {
                date: day.and_then(|d| NaiveDate::from_ymd_opt(2025, 3, d)),
                state: canonicalize(state).unwrap(),
                district: district.map(str::to_string),
                pincode: pincode.to_string(),
                counts: smallvec![2, 3],
            }
        };
        let dataset = Dataset {
            kind: DatasetKind::DemographicUpdate,
            columns: ["date", "state", "district", "pincode", "demo_age_5_17", "demo_age_17_"]
                .map(str::to_string)
                .to_vec(),
            numeric_columns: vec!["demo_age_5_17".to_string(), "demo_age_17_".to_string()],
            records: vec![
                record("Goa", Some("North Goa"), "403001", Some(4)),
                record("Goa", Some("South Goa"), "403601", Some(1)),
                record("Kerala", None, "68200", None),
            ],
            load: LoadReport::default(),
            canonicalization: CanonicalizationStats::default(),
        };

        let summary = summarize(&dataset);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 6);
        assert_eq!(summary.distinct_states, 2);
        assert_eq!(summary.distinct_districts, 2);
        assert_eq!(summary.distinct_pincodes, 3);
        assert_eq!(summary.date_min, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(summary.date_max, NaiveDate::from_ymd_opt(2025, 3, 4));
        assert_eq!(summary.null_dates, 1);
        assert_eq!(summary.invalid_pincodes, 1);
        assert_eq!(
            summary.column_totals,
            vec![("demo_age_5_17".to_string(), 6), ("demo_age_17_".to_string(), 9)]
        );
    }
}
