//! Row types of the five summary tables
//!
//! Every record is a flat struct so `serde_arrow` can turn a slice of them
//! into a record batch, and back again when a consumer reads the table.

use serde::{Deserialize, Serialize};

/// Records keyed by a canonical state name
pub trait StateKeyed {
    fn state(&self) -> &str;
}

macro_rules! impl_state_keyed {
    ($($ty:ty),* $(,)?) => {
        $(impl StateKeyed for $ty {
            fn state(&self) -> &str {
                &self.state
            }
        })*
    };
}

/// Child enrolment against child biometric updates, per state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateComplianceRecord {
    pub state: String,
    pub age_0_5: u64,
    pub age_5_17: u64,
    /// `age_0_5 + age_5_17`
    pub children_enroll: u64,
    /// Sum of `bio_age_5_17`; zero for states without biometric rows
    pub child_bio_updates: u64,
    /// `child_bio_updates / (children_enroll + 1)`
    pub compliance_ratio: f64,
}

/// Enrolment volume and district spread, per state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateGeographyRecord {
    pub state: String,
    pub total_enroll: u64,
    pub num_districts: u64,
    /// `total_enroll / (num_districts + 1)`
    pub per_capita_district: f64,
}

/// Enrolment volume of one district, ranked nationally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictVolumeRecord {
    /// 1-based position in the national ranking
    pub rank: u64,
    pub district: String,
    pub total_enroll: u64,
    /// Whether the district is in the national urban set
    pub is_urban: bool,
}

/// Urban district count against enrolment volume, per state
///
/// `urban_pct` divides by enrolment volume, not by the number of districts,
/// so it is not a percentage of districts despite its name. The value is kept
/// as is because downstream consumers depend on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUrbanRuralRecord {
    pub state: String,
    pub total_enroll: u64,
    /// Distinct districts of this state in the national urban set
    pub urban_districts: u64,
    /// `urban_districts / (total_enroll + 1)`
    pub urban_pct: f64,
}

/// One row of the analytics input: the join of the other state tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMetricsRecord {
    pub state: String,
    pub total_enroll: u64,
    pub num_districts: u64,
    pub urban_pct: f64,
    pub compliance_ratio: f64,
}

impl_state_keyed!(
    StateComplianceRecord,
    StateGeographyRecord,
    StateUrbanRuralRecord,
    StateMetricsRecord,
);
