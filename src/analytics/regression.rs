//! Ordinary least squares with an intercept.
//!
//! Features are standardized before solving the normal equations, which keeps
//! the system well conditioned when columns differ by orders of magnitude
//! (enrolment counts next to ratios of order 1e-6).

use serde::{Deserialize, Serialize};

use crate::analytics::stats::{mean, r_squared, std_dev};
use crate::error::{PipelineError, Result};

/// Pivots below this magnitude mark a column as linearly dependent
const PIVOT_EPSILON: f64 = 1e-9;

/// A fitted linear model in the original feature units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    /// One coefficient per feature; zero for constant or collinear features
    pub coefficients: Vec<f64>,
    /// R² on the training rows
    pub r_squared: f64,
}

impl LinearModel {
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// Solve a square system by Gauss-Jordan elimination with partial pivoting
///
/// Columns without a usable pivot are treated as free and set to zero.
fn solve(mut matrix: Vec<Vec<f64>>, rhs: &[f64]) -> Vec<f64> {
    let p = rhs.len();
    for (row, value) in matrix.iter_mut().zip(rhs) {
        row.push(*value);
    }

    let mut pivots = Vec::with_capacity(p);
    let mut row = 0;
    for col in 0..p {
        if row == p {
            break;
        }
        let (best, magnitude) = (row..p)
            .map(|r| (r, matrix[r][col].abs()))
            .fold((row, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        if magnitude <= PIVOT_EPSILON {
            continue;
        }

        matrix.swap(row, best);
        let pivot = matrix[row][col];
        for value in &mut matrix[row][col..] {
            *value /= pivot;
        }
        let pivot_row = matrix[row].clone();
        for (r, other) in matrix.iter_mut().enumerate() {
            if r == row {
                continue;
            }
            let factor = other[col];
            if factor != 0.0 {
                for (v, pv) in other[col..].iter_mut().zip(&pivot_row[col..]) {
                    *v -= factor * pv;
                }
            }
        }

        pivots.push(col);
        row += 1;
    }

    let mut solution = vec![0.0; p];
    for (r, col) in pivots.into_iter().enumerate() {
        solution[col] = matrix[r][p];
    }
    solution
}

/// Fit `target ~ intercept + features`
///
/// # Arguments
/// * `rows` - Feature rows, all of the same width
/// * `target` - One target value per row
pub fn fit_ols(rows: &[Vec<f64>], target: &[f64]) -> Result<LinearModel> {
    if rows.is_empty() || rows.len() != target.len() {
        return Err(PipelineError::Analytics(format!(
            "linear regression needs matching non-empty inputs, got {} rows and {} targets",
            rows.len(),
            target.len()
        )));
    }
    let n = rows.len() as f64;
    let p = rows[0].len();

    let columns: Vec<Vec<f64>> = (0..p).map(|j| rows.iter().map(|r| r[j]).collect()).collect();
    let means: Vec<f64> = columns.iter().map(|c| mean(c)).collect();
    let sds: Vec<f64> = columns.iter().map(|c| std_dev(c)).collect();
    let y_mean = mean(target);

    let z: Vec<Vec<f64>> = columns
        .iter()
        .zip(means.iter().zip(&sds))
        .map(|(col, (m, sd))| {
            if *sd > 0.0 {
                col.iter().map(|v| (v - m) / sd).collect()
            } else {
                vec![0.0; col.len()]
            }
        })
        .collect();

    let gram: Vec<Vec<f64>> = (0..p)
        .map(|a| {
            (0..p)
                .map(|b| z[a].iter().zip(&z[b]).map(|(x, y)| x * y).sum::<f64>() / n)
                .collect()
        })
        .collect();
    let moment: Vec<f64> = z
        .iter()
        .map(|col| {
            col.iter()
                .zip(target)
                .map(|(x, y)| x * (y - y_mean))
                .sum::<f64>()
                / n
        })
        .collect();

    let standardized = solve(gram, &moment);
    let coefficients: Vec<f64> = standardized
        .iter()
        .zip(&sds)
        .map(|(b, sd)| if *sd > 0.0 { b / sd } else { 0.0 })
        .collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&means)
            .map(|(c, m)| c * m)
            .sum::<f64>();

    let mut model = LinearModel {
        intercept,
        coefficients,
        r_squared: 0.0,
    };
    let predicted: Vec<f64> = rows.iter().map(|r| model.predict(r)).collect();
    model.r_squared = r_squared(target, &predicted);

    if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
        return Err(PipelineError::Analytics(
            "linear regression produced non-finite coefficients".to_string(),
        ));
    }
    Ok(model)
}
