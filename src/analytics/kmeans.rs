//! K-means clustering with k-means++ seeding and restarts.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analytics::stats::{squared_distance, variance};
use crate::error::{PipelineError, Result};

/// Parameters of one clustering run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance, scaled by the mean feature variance
    pub tolerance: f64,
    pub seed: u64,
}

/// Best partition found across restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansResult {
    /// Number of clusters actually used
    pub k: usize,
    /// Cluster index of each input point
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    /// Lloyd iterations of the winning restart
    pub iterations: usize,
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

/// Choose initial centroids with k-means++
fn init_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..n)].clone());

    let mut closest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            closest
                .iter()
                .position(|d| {
                    acc += d;
                    acc > target
                })
                .unwrap_or(n - 1)
        } else {
            rng.random_range(0..n)
        };

        let chosen = points[next].clone();
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &chosen));
        }
        centroids.push(chosen);
    }

    centroids
}

/// Lloyd iterations from a given start; returns labels, centroids, inertia, iterations
fn lloyd(
    points: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iter: usize,
    tol: f64,
) -> (Vec<usize>, Vec<Vec<f64>>, f64, usize) {
    let dims = points[0].len();
    let mut labels = vec![0; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;
        for (label, point) in labels.iter_mut().zip(points) {
            *label = nearest(point, &centroids).0;
        }

        let mut sums = vec![vec![0.0; dims]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (label, point) in labels.iter().zip(points) {
            counts[*label] += 1;
            for (s, v) in sums[*label].iter_mut().zip(point) {
                *s += v;
            }
        }

        let mut shift = 0.0;
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
            // An empty cluster keeps its previous centroid
            if count == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();
            shift += squared_distance(centroid, &updated);
            *centroid = updated;
        }

        if shift <= tol {
            break;
        }
    }

    let mut inertia = 0.0;
    for (label, point) in labels.iter_mut().zip(points) {
        let (idx, d) = nearest(point, &centroids);
        *label = idx;
        inertia += d;
    }

    (labels, centroids, inertia, iterations)
}

/// Partition `points` into at most `params.k` clusters
///
/// `k` is capped at the number of points. Restarts share one generator
/// seeded from `params.seed`, so the result depends only on the inputs and
/// the parameters.
pub fn kmeans(points: &[Vec<f64>], params: &KMeansParams) -> Result<KMeansResult> {
    let Some(first) = points.first() else {
        return Err(PipelineError::Analytics(
            "k-means needs at least one point".to_string(),
        ));
    };
    let dims = first.len();
    if points.iter().any(|p| p.len() != dims) {
        return Err(PipelineError::Analytics(
            "k-means points differ in dimension".to_string(),
        ));
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(PipelineError::Analytics(
            "k-means input contains non-finite values".to_string(),
        ));
    }

    let k = params.k.min(points.len()).max(1);
    let mean_variance = if dims == 0 {
        0.0
    } else {
        (0..dims)
            .map(|d| variance(&points.iter().map(|p| p[d]).collect::<Vec<_>>()))
            .sum::<f64>()
            / dims as f64
    };
    let tol = params.tolerance * mean_variance;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<KMeansResult> = None;

    for restart in 0..params.n_init.max(1) {
        let start = init_plus_plus(points, k, &mut rng);
        let (labels, centroids, inertia, iterations) = lloyd(points, start, params.max_iter, tol);
        log::trace!(
            "k-means restart {restart}: inertia {inertia:.6} after {iterations} iterations"
        );

        if best.as_ref().is_none_or(|b| inertia < b.inertia) {
            best = Some(KMeansResult {
                k,
                labels,
                centroids,
                inertia,
                iterations,
            });
        }
    }

    best.ok_or_else(|| PipelineError::Analytics("k-means produced no result".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize, seed: u64) -> KMeansParams {
        KMeansParams {
            k,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed,
        }
    }

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    #[test]
    fn test_separates_obvious_blobs() {
        let result = kmeans(&blobs(), &params(2, 42)).unwrap();
        assert_eq!(result.k, 2);
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[0], result.labels[2]);
        assert_eq!(result.labels[3], result.labels[4]);
        assert_ne!(result.labels[0], result.labels[3]);
        assert!(result.inertia < 0.1);
    }

    #[test]
    fn test_reproducible_for_fixed_seed() {
        let a = kmeans(&blobs(), &params(3, 7)).unwrap();
        let b = kmeans(&blobs(), &params(3, 7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_capped_at_point_count() {
        let points = vec![vec![1.0], vec![2.0]];
        let result = kmeans(&points, &params(4, 42)).unwrap();
        assert_eq!(result.k, 2);
        assert_ne!(result.labels[0], result.labels[1]);
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn test_duplicate_points() {
        let points = vec![vec![1.0, 1.0]; 5];
        let result = kmeans(&points, &params(4, 42)).unwrap();
        assert_eq!(result.inertia, 0.0);
        assert_eq!(result.labels.len(), 5);
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(kmeans(&[], &params(4, 42)).is_err());
    }
}
