//! Aggregation of the cleaned datasets into the five summary tables.
//!
//! Grouping is keyed on canonical state names and cleaned district names.
//! Every table is sorted deterministically so reruns produce identical files.

pub mod join;
pub mod records;

use std::fmt;

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::canonical::CanonicalState;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::loader::Dataset;
use crate::schema::DatasetKind;

pub use join::{inner_join_by_state, join_state_metrics};
pub use records::{
    DistrictVolumeRecord, StateComplianceRecord, StateGeographyRecord, StateKeyed,
    StateMetricsRecord, StateUrbanRuralRecord,
};

/// The five persisted summary tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryTable {
    StateCompliance,
    StateGeography,
    DistrictVolumes,
    StateUrbanRural,
    StateMetrics,
}

impl SummaryTable {
    pub const ALL: [Self; 5] = [
        Self::StateCompliance,
        Self::StateGeography,
        Self::DistrictVolumes,
        Self::StateUrbanRural,
        Self::StateMetrics,
    ];

    /// Table name, also the stem of its Parquet file
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StateCompliance => "state_compliance",
            Self::StateGeography => "state_geography",
            Self::DistrictVolumes => "district_volumes",
            Self::StateUrbanRural => "state_urban_rural",
            Self::StateMetrics => "state_metrics_full",
        }
    }

    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.parquet", self.name())
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All derived tables of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTables {
    pub compliance: Vec<StateComplianceRecord>,
    pub geography: Vec<StateGeographyRecord>,
    pub districts: Vec<DistrictVolumeRecord>,
    pub urban_rural: Vec<StateUrbanRuralRecord>,
    pub metrics: Vec<StateMetricsRecord>,
}

impl SummaryTables {
    #[must_use]
    pub fn row_count(&self, table: SummaryTable) -> usize {
        match table {
            SummaryTable::StateCompliance => self.compliance.len(),
            SummaryTable::StateGeography => self.geography.len(),
            SummaryTable::DistrictVolumes => self.districts.len(),
            SummaryTable::StateUrbanRural => self.urban_rural.len(),
            SummaryTable::StateMetrics => self.metrics.len(),
        }
    }

    /// Row count of every table, in [`SummaryTable::ALL`] order
    #[must_use]
    pub fn row_counts(&self) -> Vec<(&'static str, usize)> {
        SummaryTable::ALL
            .iter()
            .map(|t| (t.name(), self.row_count(*t)))
            .collect()
    }

    /// Names of the districts in the urban set
    #[must_use]
    pub fn urban_districts(&self) -> FxHashSet<&str> {
        self.districts
            .iter()
            .filter(|d| d.is_urban)
            .map(|d| d.district.as_str())
            .collect()
    }
}

/// Locate a count column the aggregation depends on
fn required_index(dataset: &Dataset, column: &str) -> Result<usize> {
    dataset
        .column_index(column)
        .ok_or_else(|| PipelineError::SchemaMismatch {
            category: dataset.kind.to_string(),
            file: dataset.load.files.first().cloned().unwrap_or_default(),
            missing: vec![column.to_string()],
            unexpected: Vec::new(),
        })
}

fn expect_kind(dataset: &Dataset, kind: DatasetKind) -> Result<()> {
    if dataset.kind == kind {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "expected the {kind} dataset, got {}",
            dataset.kind
        )))
    }
}

/// Per-state enrolment sums gathered in one pass
#[derive(Debug, Default)]
struct StateEnrolment<'a> {
    age_0_5: u64,
    age_5_17: u64,
    total: u64,
    districts: FxHashSet<&'a str>,
}

/// Positions of the enrolment age buckets within a row
struct AgeColumns {
    age_0_5: usize,
    age_5_17: usize,
    age_18_greater: usize,
}

impl AgeColumns {
    fn locate(enrolment: &Dataset) -> Result<Self> {
        Ok(Self {
            age_0_5: required_index(enrolment, "age_0_5")?,
            age_5_17: required_index(enrolment, "age_5_17")?,
            age_18_greater: required_index(enrolment, "age_18_greater")?,
        })
    }

    fn total(&self, counts: &[u64]) -> u64 {
        counts[self.age_0_5]
            .saturating_add(counts[self.age_5_17])
            .saturating_add(counts[self.age_18_greater])
    }
}

fn group_enrolment<'a>(
    enrolment: &'a Dataset,
    ages: &AgeColumns,
) -> FxHashMap<CanonicalState, StateEnrolment<'a>> {
    let mut by_state: FxHashMap<CanonicalState, StateEnrolment<'a>> = FxHashMap::default();
    for record in &enrolment.records {
        let entry = by_state.entry(record.state).or_default();
        entry.age_0_5 = entry.age_0_5.saturating_add(record.counts[ages.age_0_5]);
        entry.age_5_17 = entry.age_5_17.saturating_add(record.counts[ages.age_5_17]);
        entry.total = entry.total.saturating_add(ages.total(&record.counts));
        if let Some(district) = &record.district {
            entry.districts.insert(district.as_str());
        }
    }
    by_state
}

/// Compliance ratios, left-joined from enrolment onto biometric updates
fn compliance_table(
    by_state: &FxHashMap<CanonicalState, StateEnrolment<'_>>,
    biometric: &Dataset,
) -> Result<Vec<StateComplianceRecord>> {
    let bio_idx = required_index(biometric, "bio_age_5_17")?;

    let mut bio_by_state: FxHashMap<CanonicalState, u64> = FxHashMap::default();
    for record in &biometric.records {
        let sum = bio_by_state.entry(record.state).or_default();
        *sum = sum.saturating_add(record.counts[bio_idx]);
    }

    Ok(by_state
        .iter()
        .sorted_by_key(|(state, _)| **state)
        .map(|(state, sums)| {
            let children_enroll = sums.age_0_5.saturating_add(sums.age_5_17);
            let child_bio_updates = bio_by_state.get(state).copied().unwrap_or(0);
            StateComplianceRecord {
                state: state.to_string(),
                age_0_5: sums.age_0_5,
                age_5_17: sums.age_5_17,
                children_enroll,
                child_bio_updates,
                compliance_ratio: child_bio_updates as f64 / (children_enroll as f64 + 1.0),
            }
        })
        .collect())
}

fn geography_table(
    by_state: &FxHashMap<CanonicalState, StateEnrolment<'_>>,
) -> Vec<StateGeographyRecord> {
    by_state
        .iter()
        .map(|(state, sums)| {
            let num_districts = sums.districts.len() as u64;
            StateGeographyRecord {
                state: state.to_string(),
                total_enroll: sums.total,
                num_districts,
                per_capita_district: sums.total as f64 / (num_districts as f64 + 1.0),
            }
        })
        .sorted_by(|a, b| {
            b.total_enroll
                .cmp(&a.total_enroll)
                .then_with(|| a.state.cmp(&b.state))
        })
        .collect()
}

/// National district ranking; the first `urban_top_n` are urban
fn district_table(
    enrolment: &Dataset,
    ages: &AgeColumns,
    urban_top_n: usize,
) -> Vec<DistrictVolumeRecord> {
    let mut by_district: FxHashMap<&str, u64> = FxHashMap::default();
    for record in &enrolment.records {
        if let Some(district) = &record.district {
            let sum = by_district.entry(district.as_str()).or_default();
            *sum = sum.saturating_add(ages.total(&record.counts));
        }
    }

    by_district
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .enumerate()
        .map(|(idx, (district, total_enroll))| DistrictVolumeRecord {
            rank: idx as u64 + 1,
            district: district.to_string(),
            total_enroll,
            is_urban: idx < urban_top_n,
        })
        .collect()
}

fn urban_rural_table(
    by_state: &FxHashMap<CanonicalState, StateEnrolment<'_>>,
    districts: &[DistrictVolumeRecord],
) -> Vec<StateUrbanRuralRecord> {
    let urban: FxHashSet<&str> = districts
        .iter()
        .filter(|d| d.is_urban)
        .map(|d| d.district.as_str())
        .collect();

    by_state
        .iter()
        .sorted_by_key(|(state, _)| **state)
        .map(|(state, sums)| {
            let urban_districts =
                sums.districts.iter().filter(|d| urban.contains(*d)).count() as u64;
            StateUrbanRuralRecord {
                state: state.to_string(),
                total_enroll: sums.total,
                urban_districts,
                urban_pct: urban_districts as f64 / (sums.total as f64 + 1.0),
            }
        })
        .collect()
}

/// Build all five summary tables
///
/// # Arguments
/// * `enrolment` - Cleaned enrolment rows
/// * `demographic` - Cleaned demographic update rows; only used for coverage checks
/// * `biometric` - Cleaned biometric update rows
/// * `config` - Supplies the size of the urban district set
pub fn aggregate(
    enrolment: &Dataset,
    demographic: &Dataset,
    biometric: &Dataset,
    config: &PipelineConfig,
) -> Result<SummaryTables> {
    expect_kind(enrolment, DatasetKind::Enrolment)?;
    expect_kind(demographic, DatasetKind::DemographicUpdate)?;
    expect_kind(biometric, DatasetKind::BiometricUpdate)?;

    let ages = AgeColumns::locate(enrolment)?;
    let by_state = group_enrolment(enrolment, &ages);

    let compliance = compliance_table(&by_state, biometric)?;
    let geography = geography_table(&by_state);
    let districts = district_table(enrolment, &ages, config.urban_top_n);
    let urban_rural = urban_rural_table(&by_state, &districts);
    let metrics = join_state_metrics(&geography, &urban_rural, &compliance);

    for update in [demographic, biometric] {
        let uncovered: Vec<&str> = update
            .records
            .iter()
            .map(|r| r.state)
            .unique()
            .filter(|s| !by_state.contains_key(s))
            .map(CanonicalState::as_str)
            .sorted()
            .collect();
        if !uncovered.is_empty() {
            log::warn!(
                "{} has rows for states without enrolment, excluded from the summaries: {}",
                update.kind,
                uncovered.join(", ")
            );
        }
    }

    log::info!(
        "Aggregated {} states, {} districts ({} urban)",
        geography.len(),
        districts.len(),
        districts.iter().filter(|d| d.is_urban).count()
    );

    Ok(SummaryTables {
        compliance,
        geography,
        districts,
        urban_rural,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalizationStats, canonicalize};
    use crate::loader::{CleanRecord, LoadReport};
    use smallvec::SmallVec;

    fn dataset(kind: DatasetKind, columns: &[&str], rows: &[(&str, &str, &[u64])]) -> Dataset {
        Dataset {
            kind,
            columns: Vec::new(),
            numeric_columns: columns.iter().map(|c| (*c).to_string()).collect(),
            records: rows
                .iter()
                .map(|(state, district, counts)| CleanRecord {
                    date: None,
                    state: canonicalize(state).unwrap(),
                    district: Some((*district).to_string()),
                    pincode: "000000".to_string(),
                    counts: SmallVec::from_slice(counts),
                })
                .collect(),
            load: LoadReport::default(),
            canonicalization: CanonicalizationStats::default(),
        }
    }

    const ENROL: [&str; 3] = ["age_0_5", "age_5_17", "age_18_greater"];

    fn run(
        enrol: &[(&str, &str, &[u64])],
        bio: &[(&str, &str, &[u64])],
        top_n: usize,
    ) -> SummaryTables {
        let enrolment = dataset(DatasetKind::Enrolment, &ENROL, enrol);
        let demographic = dataset(DatasetKind::DemographicUpdate, &[], &[]);
        let biometric = dataset(DatasetKind::BiometricUpdate, &["bio_age_5_17"], bio);
        let config = PipelineConfig::builder().urban_top_n(top_n).build();
        aggregate(&enrolment, &demographic, &biometric, &config).unwrap()
    }

    #[test]
    fn test_compliance_ratio_with_missing_biometric() {
        let tables = run(
            &[("West Bengal", "Kolkata", &[10, 20, 5]), ("Goa", "North Goa", &[1, 1, 0])],
            &[("West Bengal", "Kolkata", &[15])],
            50,
        );

        let wb = &tables.compliance[1];
        assert_eq!(wb.state, "West Bengal");
        assert_eq!(wb.children_enroll, 30);
        assert_eq!(wb.child_bio_updates, 15);
        assert!((wb.compliance_ratio - 15.0 / 31.0).abs() < 1e-12);

        let goa = &tables.compliance[0];
        assert_eq!(goa.child_bio_updates, 0);
        assert_eq!(goa.compliance_ratio, 0.0);
    }

    #[test]
    fn test_geography_sorted_by_volume() {
        let tables = run(
            &[
                ("Goa", "North Goa", &[1, 1, 1]),
                ("Kerala", "Ernakulam", &[5, 5, 5]),
                ("Kerala", "Kollam", &[1, 0, 0]),
                ("Assam", "Kamrup", &[1, 1, 1]),
            ],
            &[],
            50,
        );

        let order: Vec<_> = tables.geography.iter().map(|g| g.state.as_str()).collect();
        assert_eq!(order, vec!["Kerala", "Assam", "Goa"]);
        assert_eq!(tables.geography[0].num_districts, 2);
        assert!((tables.geography[0].per_capita_district - 16.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_urban_set_is_national_and_consistent() {
        let tables = run(
            &[
                ("Kerala", "Ernakulam", &[50, 0, 0]),
                ("Kerala", "Kollam", &[1, 0, 0]),
                ("Goa", "North Goa", &[30, 0, 0]),
                ("Goa", "South Goa", &[2, 0, 0]),
            ],
            &[],
            2,
        );

        let urban: Vec<_> = tables
            .districts
            .iter()
            .map(|d| (d.rank, d.district.as_str(), d.is_urban))
            .collect();
        assert_eq!(
            urban,
            vec![
                (1, "Ernakulam", true),
                (2, "North Goa", true),
                (3, "South Goa", false),
                (4, "Kollam", false),
            ]
        );

        let kerala = tables.urban_rural.iter().find(|r| r.state == "Kerala").unwrap();
        assert_eq!(kerala.urban_districts, 1);
        assert!((kerala.urban_pct - 1.0 / 52.0).abs() < 1e-12);
        assert_eq!(tables.urban_districts().len(), 2);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let big = u64::MAX / 2 + 1;
        let tables = run(
            &[("Goa", "North Goa", &[big, big, 1]), ("Goa", "North Goa", &[big, 0, 0])],
            &[("Goa", "North Goa", &[big]), ("Goa", "North Goa", &[big])],
            50,
        );

        let goa = &tables.compliance[0];
        assert_eq!(goa.age_0_5, u64::MAX);
        assert_eq!(goa.children_enroll, u64::MAX);
        assert_eq!(goa.child_bio_updates, u64::MAX);
        assert!(goa.compliance_ratio.is_finite());
        assert_eq!(tables.geography[0].total_enroll, u64::MAX);
        assert_eq!(tables.districts[0].total_enroll, u64::MAX);
        assert!(tables.urban_rural[0].urban_pct.is_finite());
    }

    #[test]
    fn test_district_ties_break_by_name() {
        let tables = run(
            &[("Goa", "South Goa", &[3, 0, 0]), ("Goa", "North Goa", &[3, 0, 0])],
            &[],
            1,
        );
        assert_eq!(tables.districts[0].district, "North Goa");
        assert!(tables.districts[0].is_urban);
        assert!(!tables.districts[1].is_urban);
    }

    #[test]
    fn test_biometric_only_state_not_added() {
        let tables = run(
            &[("Goa", "North Goa", &[1, 1, 1])],
            &[("Kerala", "Ernakulam", &[9])],
            50,
        );
        assert_eq!(tables.compliance.len(), 1);
        assert_eq!(tables.metrics.len(), 1);
        assert_eq!(tables.metrics[0].state, "Goa");
    }

    #[test]
    fn test_missing_age_column_is_schema_error() {
        let enrolment = dataset(DatasetKind::Enrolment, &["age_0_5", "age_5_17"], &[]);
        let demographic = dataset(DatasetKind::DemographicUpdate, &[], &[]);
        let biometric = dataset(DatasetKind::BiometricUpdate, &["bio_age_5_17"], &[]);
        let err = aggregate(&enrolment, &demographic, &biometric, &PipelineConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("age_18_greater"));
    }
}
