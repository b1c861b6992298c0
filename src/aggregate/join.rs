//! Inner joins of state-keyed tables.

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::aggregate::records::{
    StateComplianceRecord, StateGeographyRecord, StateKeyed, StateMetricsRecord,
    StateUrbanRuralRecord,
};

fn index_by_state<T: StateKeyed>(rows: &[T]) -> FxHashMap<&str, &T> {
    rows.iter().map(|row| (row.state(), row)).collect()
}

/// Join three tables on state, keeping only states present in all of them
///
/// Output is ordered by state name.
#[must_use]
pub fn inner_join_by_state<'a, A, B, C>(
    left: &'a [A],
    middle: &'a [B],
    right: &'a [C],
) -> Vec<(&'a A, &'a B, &'a C)>
where
    A: StateKeyed,
    B: StateKeyed,
    C: StateKeyed,
{
    let middle = index_by_state(middle);
    let right = index_by_state(right);

    left.iter()
        .filter_map(|a| {
            let b = middle.get(a.state())?;
            let c = right.get(a.state())?;
            Some((a, *b, *c))
        })
        .sorted_by(|x, y| x.0.state().cmp(y.0.state()))
        .collect()
}

/// Build the metrics table from geography, urban/rural and compliance rows
///
/// A state missing from any of the three tables is left out entirely.
#[must_use]
pub fn join_state_metrics(
    geography: &[StateGeographyRecord],
    urban_rural: &[StateUrbanRuralRecord],
    compliance: &[StateComplianceRecord],
) -> Vec<StateMetricsRecord> {
    inner_join_by_state(geography, urban_rural, compliance)
        .into_iter()
        .map(|(geo, urban, comp)| StateMetricsRecord {
            state: geo.state.clone(),
            total_enroll: geo.total_enroll,
            num_districts: geo.num_districts,
            urban_pct: urban.urban_pct,
            compliance_ratio: comp.compliance_ratio,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geography(state: &str, total: u64) -> StateGeographyRecord {
        StateGeographyRecord {
            state: state.to_string(),
            total_enroll: total,
            num_districts: 2,
            per_capita_district: total as f64 / 3.0,
        }
    }

    fn urban(state: &str) -> StateUrbanRuralRecord {
        StateUrbanRuralRecord {
            state: state.to_string(),
            total_enroll: 10,
            urban_districts: 1,
            urban_pct: 1.0 / 11.0,
        }
    }

    fn compliance(state: &str, ratio: f64) -> StateComplianceRecord {
        StateComplianceRecord {
            state: state.to_string(),
            age_0_5: 0,
            age_5_17: 0,
            children_enroll: 0,
            child_bio_updates: 0,
            compliance_ratio: ratio,
        }
    }

    #[test]
    fn test_state_missing_from_one_table_is_excluded() {
        let geo = vec![geography("Kerala", 10), geography("Goa", 20), geography("Assam", 5)];
        let urb = vec![urban("Goa"), urban("Kerala"), urban("Assam")];
        let comp = vec![compliance("Goa", 0.5), compliance("Kerala", 0.25)];

        let metrics = join_state_metrics(&geo, &urb, &comp);
        let states: Vec<_> = metrics.iter().map(|m| m.state.as_str()).collect();
        assert_eq!(states, vec!["Goa", "Kerala"]);
        assert_eq!(metrics[0].total_enroll, 20);
        assert!((metrics[0].compliance_ratio - 0.5).abs() < f64::EPSILON);
        assert!((metrics[1].urban_pct - 1.0 / 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_side_yields_empty_join() {
        let geo = vec![geography("Kerala", 10)];
        let urb: Vec<StateUrbanRuralRecord> = Vec::new();
        let comp = vec![compliance("Kerala", 0.1)];
        assert!(join_state_metrics(&geo, &urb, &comp).is_empty());
    }
}
