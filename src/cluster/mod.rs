//! Clustering strategies.
//!
//! Both strategies turn a list of [`GeoPoint`]s into a [`Partition`]: k
//! medoids with contiguous cluster ids `0..k` plus the cluster label of every
//! input point. Medoids are always input points, never synthetic centres.

mod grid;
mod medoid;
mod pam;

pub use grid::{CellKey, GridClustering, MIN_STEP};
pub use medoid::{MedoidSearch, DEFAULT_SAMPLE_LIMIT, DEFAULT_SAMPLE_SEED};
pub use pam::{PamClustering, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_IMPROVEMENT, DEFAULT_SEED};

use crate::error::{Error, Result};
use crate::geo::GeoPoint;

/// Representative point of one cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Medoid {
    pub cluster: usize,
    pub point: GeoPoint,
}

/// Cluster chosen for one input point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub point: i64,
    pub cluster: usize,
}

/// Cluster size statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub clusters: usize,
    pub empty: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub mean_size: f64,
}

/// Outcome of a clustering run.
///
/// `medoids[c].cluster == c` for every cluster, and `labels[i]` is the
/// cluster of the i-th input point.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub medoids: Vec<Medoid>,
    pub labels: Vec<usize>,
}

impl Partition {
    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.medoids.len()
    }

    /// Member count per cluster.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    pub fn summary(&self) -> ClusterSummary {
        let sizes = self.sizes();
        let clusters = sizes.len();
        let mean_size = if clusters == 0 {
            0.0
        } else {
            self.labels.len() as f64 / clusters as f64
        };
        ClusterSummary {
            clusters,
            empty: sizes.iter().filter(|&&s| s == 0).count(),
            min_size: sizes.iter().copied().min().unwrap_or(0),
            max_size: sizes.iter().copied().max().unwrap_or(0),
            mean_size,
        }
    }

    /// Pair every point with its cluster. `points` must be the slice the
    /// partition was computed from.
    pub fn assignments(&self, points: &[GeoPoint]) -> Vec<ClusterAssignment> {
        points
            .iter()
            .zip(&self.labels)
            .map(|(p, &cluster)| ClusterAssignment {
                point: p.id,
                cluster,
            })
            .collect()
    }
}

/// A clustering algorithm over geographic points.
pub trait Clustering {
    /// Cluster `points`, returning medoids and per-point labels.
    fn partition(&self, points: &[GeoPoint]) -> Result<Partition>;

    /// Only the medoids, ordered by cluster id.
    fn cluster(&self, points: &[GeoPoint]) -> Result<Vec<Medoid>> {
        self.partition(points).map(|p| p.medoids)
    }
}

/// Strategy picked at run time.
#[derive(Debug, Clone)]
pub enum ClusteringStrategy {
    Grid(GridClustering),
    Pam(PamClustering),
}

impl Clustering for ClusteringStrategy {
    fn partition(&self, points: &[GeoPoint]) -> Result<Partition> {
        let partition = match self {
            ClusteringStrategy::Grid(grid) => grid.partition(points)?,
            ClusteringStrategy::Pam(pam) => pam.partition(points)?,
        };
        let summary = partition.summary();
        tracing::info!(
            clusters = summary.clusters,
            empty = summary.empty,
            min = summary.min_size,
            max = summary.max_size,
            mean = format!("{:.1}", summary.mean_size),
            "clustering done"
        );
        Ok(partition)
    }
}

pub(crate) fn validate_search(search: MedoidSearch) -> Result<()> {
    match search {
        MedoidSearch::Sampled { limit: 0, .. } => {
            Err(Error::invalid("sample_limit", "must be at least 1"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn partition() -> Partition {
        let medoids = (0..3)
            .map(|c| Medoid {
                cluster: c,
                point: GeoPoint::new(c as i64, c as f64, 0.0),
            })
            .collect();
        Partition {
            medoids,
            labels: vec![0, 0, 0, 2, 2, 0],
        }
    }

    #[test]
    fn test_sizes_and_summary() {
        let p = partition();
        assert_eq!(p.k(), 3);
        assert_eq!(p.sizes(), vec![4, 0, 2]);

        let s = p.summary();
        assert_eq!(s.clusters, 3);
        assert_eq!(s.empty, 1);
        assert_eq!(s.min_size, 0);
        assert_eq!(s.max_size, 4);
        assert_abs_diff_eq!(s.mean_size, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_assignments() {
        let points: Vec<GeoPoint> = (0..6).map(|i| GeoPoint::new(10 + i, 0.0, 0.0)).collect();
        let assignments = partition().assignments(&points);
        assert_eq!(assignments.len(), 6);
        assert_eq!(
            assignments[3],
            ClusterAssignment {
                point: 13,
                cluster: 2
            }
        );
    }

    #[test]
    fn test_strategy_dispatch() {
        let points = vec![
            GeoPoint::new(1, 0.0, 0.0),
            GeoPoint::new(2, 0.0, 1.0),
            GeoPoint::new(3, 89.0, 0.0),
        ];
        let grid = ClusteringStrategy::Grid(GridClustering::new(1.0, 1.0).unwrap());
        assert_eq!(grid.cluster(&points).unwrap().len(), 3);

        let pam = ClusteringStrategy::Pam(PamClustering::new(2));
        let medoids = pam.cluster(&points).unwrap();
        assert_eq!(medoids.len(), 2);
        assert_eq!(medoids[1].cluster, 1);
    }

    #[test]
    fn test_zero_sample_limit_rejected() {
        let search = MedoidSearch::Sampled { limit: 0, seed: 1 };
        assert!(validate_search(search).is_err());
        assert!(GridClustering::new(1.0, 1.0)
            .unwrap()
            .with_medoid_search(search)
            .is_err());
        assert!(validate_search(MedoidSearch::Exact).is_ok());
    }
}
