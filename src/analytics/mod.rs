//! Correlation, clustering and regression over the state metrics table.
//!
//! Analytics never fail because there are too few states: below
//! `min_rows` the report carries [`AnalyticsStatus::InsufficientData`] and
//! only the correlation matrix (when at least two rows exist).

pub mod forest;
pub mod kmeans;
pub mod regression;
pub mod stats;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::aggregate::StateMetricsRecord;
use crate::config::AnalyticsConfig;
use crate::error::{PipelineError, Result};

pub use forest::{ForestFit, RandomForest, fit_and_score, fit_forest};
pub use kmeans::{KMeansParams, KMeansResult, kmeans};
pub use regression::{LinearModel, fit_ols};

/// Columns of the correlation matrix, in order
pub const CORRELATION_FEATURES: [&str; 4] =
    ["total_enroll", "num_districts", "urban_pct", "compliance_ratio"];

/// Standardized clustering features, in order
pub const CLUSTER_FEATURES: [&str; 3] = ["total_enroll", "compliance_ratio", "urban_pct"];

/// Regression predictors, in order
pub const REGRESSION_FEATURES: [&str; 3] = ["total_enroll", "num_districts", "urban_pct"];

/// Regression target
pub const REGRESSION_TARGET: &str = "compliance_ratio";

const TRAINING_SCORE_NOTE: &str = "R² values are computed on the training rows; no train/test split is made, so they overstate predictive quality";
const URBAN_PCT_NOTE: &str = "urban_pct divides the urban district count by enrolment volume plus one, not by the district count";

/// Whether the full analysis ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticsStatus {
    Complete,
    /// Too few rows for clustering and regression
    InsufficientData { rows: usize, required: usize },
}

/// Pairwise Pearson correlations; undefined cells are `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Correlation between two named columns
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Cluster label of one state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub state: String,
    pub cluster: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringReport {
    pub features: Vec<String>,
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub inertia: f64,
    pub iterations: usize,
    /// Centroids in standardized feature space
    pub centroids: Vec<Vec<f64>>,
    pub cluster_sizes: Vec<usize>,
    pub assignments: Vec<ClusterAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub target: String,
    pub features: Vec<String>,
    pub linear: LinearModel,
    pub forest: ForestFit,
}

/// Everything the analytics engine reports for one metrics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub status: AnalyticsStatus,
    pub rows: usize,
    pub correlation: Option<CorrelationMatrix>,
    pub clustering: Option<ClusteringReport>,
    pub regression: Option<RegressionReport>,
    pub limitations: Vec<String>,
}

fn column(rows: &[StateMetricsRecord], name: &str) -> Vec<f64> {
    rows.iter()
        .map(|r| match name {
            "total_enroll" => r.total_enroll as f64,
            "num_districts" => r.num_districts as f64,
            "urban_pct" => r.urban_pct,
            _ => r.compliance_ratio,
        })
        .collect()
}

/// Build the Pearson correlation matrix of [`CORRELATION_FEATURES`]
#[must_use]
pub fn correlation_matrix(rows: &[StateMetricsRecord]) -> CorrelationMatrix {
    let columns: Vec<Vec<f64>> = CORRELATION_FEATURES.iter().map(|c| column(rows, c)).collect();
    let values = columns
        .iter()
        .map(|a| {
            columns
                .iter()
                .map(|b| {
                    let r = stats::pearson(a, b);
                    (!r.is_nan()).then_some(r)
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        columns: CORRELATION_FEATURES.iter().map(|c| (*c).to_string()).collect(),
        values,
    }
}

/// Standardize [`CLUSTER_FEATURES`] and run k-means
pub fn cluster_states(
    rows: &[StateMetricsRecord],
    config: &AnalyticsConfig,
) -> Result<ClusteringReport> {
    let standardized: Vec<Vec<f64>> = CLUSTER_FEATURES
        .iter()
        .map(|c| stats::standardize(&column(rows, c)))
        .collect();
    let points: Vec<Vec<f64>> = (0..rows.len())
        .map(|i| standardized.iter().map(|col| col[i]).collect())
        .collect();

    let result = kmeans(
        &points,
        &KMeansParams {
            k: config.n_clusters,
            n_init: config.n_init,
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            seed: config.seed,
        },
    )?;

    let mut cluster_sizes = vec![0; result.k];
    for label in &result.labels {
        cluster_sizes[*label] += 1;
    }

    Ok(ClusteringReport {
        features: CLUSTER_FEATURES.iter().map(|c| (*c).to_string()).collect(),
        k: result.k,
        seed: config.seed,
        n_init: config.n_init,
        inertia: result.inertia,
        iterations: result.iterations,
        centroids: result.centroids,
        cluster_sizes,
        assignments: rows
            .iter()
            .zip(&result.labels)
            .map(|(r, label)| ClusterAssignment {
                state: r.state.clone(),
                cluster: *label,
            })
            .collect(),
    })
}

/// Fit the linear model and the forest on [`REGRESSION_FEATURES`]
pub fn regress_compliance(
    rows: &[StateMetricsRecord],
    config: &AnalyticsConfig,
) -> Result<RegressionReport> {
    let columns: Vec<Vec<f64>> = REGRESSION_FEATURES.iter().map(|c| column(rows, c)).collect();
    let features: Vec<Vec<f64>> = (0..rows.len())
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect();
    let target = column(rows, REGRESSION_TARGET);

    let linear = fit_ols(&features, &target)?;
    let forest = fit_and_score(&features, &target, config.n_estimators, config.seed)?;

    Ok(RegressionReport {
        target: REGRESSION_TARGET.to_string(),
        features: REGRESSION_FEATURES.iter().map(|c| (*c).to_string()).collect(),
        linear,
        forest,
    })
}

/// Run the full analysis over the metrics table
///
/// # Arguments
/// * `rows` - The state metrics table
/// * `config` - Seeds, restarts and model sizes
pub fn analyze(rows: &[StateMetricsRecord], config: &AnalyticsConfig) -> Result<AnalyticsReport> {
    let start = Instant::now();
    config.validate()?;

    if rows.iter().any(|r| !r.urban_pct.is_finite() || !r.compliance_ratio.is_finite()) {
        return Err(PipelineError::Analytics(
            "metrics table contains non-finite values".to_string(),
        ));
    }

    let correlation = (rows.len() >= 2).then(|| correlation_matrix(rows));
    let mut limitations = vec![URBAN_PCT_NOTE.to_string()];

    let required = config.min_rows.max(1);
    if rows.len() < required {
        log::warn!(
            "Only {} states in the metrics table, {required} needed; skipping clustering and regression",
            rows.len()
        );
        limitations.push(format!(
            "clustering and regression skipped: {} rows available, {required} required",
            rows.len()
        ));
        return Ok(AnalyticsReport {
            status: AnalyticsStatus::InsufficientData {
                rows: rows.len(),
                required,
            },
            rows: rows.len(),
            correlation,
            clustering: None,
            regression: None,
            limitations,
        });
    }

    let clustering = cluster_states(rows, config)?;
    let regression = regress_compliance(rows, config)?;
    limitations.push(TRAINING_SCORE_NOTE.to_string());

    log::info!(
        "Analytics over {} states: {} clusters (inertia {:.4}), linear R² {:.4}, forest R² {:.4} in {:?}",
        rows.len(),
        clustering.k,
        clustering.inertia,
        regression.linear.r_squared,
        regression.forest.r_squared,
        start.elapsed()
    );

    Ok(AnalyticsReport {
        status: AnalyticsStatus::Complete,
        rows: rows.len(),
        correlation,
        clustering: Some(clustering),
        regression: Some(regression),
        limitations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str, total: u64, districts: u64, urban: f64, ratio: f64) -> StateMetricsRecord {
        StateMetricsRecord {
            state: state.to_string(),
            total_enroll: total,
            num_districts: districts,
            urban_pct: urban,
            compliance_ratio: ratio,
        }
    }

    fn sample() -> Vec<StateMetricsRecord> {
        vec![
            row("Assam", 1000, 10, 0.001, 0.2),
            row("Bihar", 5000, 30, 0.0004, 0.1),
            row("Goa", 200, 2, 0.0, 0.5),
            row("Kerala", 3000, 14, 0.0006, 0.4),
            row("Punjab", 2500, 20, 0.0008, 0.3),
            row("Sikkim", 100, 4, 0.0, 0.6),
        ]
    }

    #[test]
    fn test_insufficient_data() {
        let rows = &sample()[..3];
        let report = analyze(rows, &AnalyticsConfig::default()).unwrap();
        assert_eq!(
            report.status,
            AnalyticsStatus::InsufficientData { rows: 3, required: 4 }
        );
        assert!(report.correlation.is_some());
        assert!(report.clustering.is_none());
        assert!(report.regression.is_none());
    }

    #[test]
    fn test_single_row_has_no_correlation() {
        let report = analyze(&sample()[..1], &AnalyticsConfig::default()).unwrap();
        assert!(report.correlation.is_none());
    }

    #[test]
    fn test_complete_analysis() {
        let config = AnalyticsConfig {
            n_estimators: 20,
            ..AnalyticsConfig::default()
        };
        let report = analyze(&sample(), &config).unwrap();
        assert_eq!(report.status, AnalyticsStatus::Complete);

        let clustering = report.clustering.unwrap();
        assert_eq!(clustering.k, 4);
        assert_eq!(clustering.assignments.len(), 6);
        assert_eq!(clustering.cluster_sizes.iter().sum::<usize>(), 6);

        let regression = report.regression.unwrap();
        assert_eq!(regression.linear.coefficients.len(), 3);
        assert_eq!(regression.forest.feature_importances.len(), 3);
        assert!(report.limitations.iter().any(|l| l.contains("training")));
    }

    #[test]
    fn test_clustering_reproducible() {
        let config = AnalyticsConfig::default();
        let a = cluster_states(&sample(), &config).unwrap();
        let b = cluster_states(&sample(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_column_correlation_is_null() {
        let rows: Vec<_> = sample()
            .into_iter()
            .map(|mut r| {
                r.num_districts = 5;
                r
            })
            .collect();
        let matrix = correlation_matrix(&rows);
        assert_eq!(matrix.get("num_districts", "total_enroll"), None);
        assert!(matrix.get("total_enroll", "total_enroll").is_some());

        let json = serde_json::to_string(&matrix).unwrap();
        assert!(json.contains("null"));
    }
}
