//! Nearest-medoid lookup for new points.

use crate::cluster::{ClusterAssignment, Medoid};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::index::KdTree;
use crate::ingest::FeatureRecord;
use rayon::prelude::*;

/// Maps points to the cluster of their nearest medoid.
///
/// Cluster ids are the positions of the medoids in the slice it was built
/// from. Two medoids on the same location resolve to the first one.
#[derive(Debug, Clone)]
pub struct ClusterAssigner {
    medoids: Vec<GeoPoint>,
    tree: KdTree<usize>,
}

impl ClusterAssigner {
    /// Medoid `i` becomes cluster `i`.
    pub fn new(medoids: &[GeoPoint]) -> Self {
        let tree = KdTree::build(
            medoids
                .iter()
                .enumerate()
                .map(|(cluster, p)| (p.to_cartesian().key(), cluster)),
        );
        tracing::debug!(medoids = medoids.len(), "built cluster assigner");
        Self {
            medoids: medoids.to_vec(),
            tree,
        }
    }

    /// From clustering output, ordered by cluster id.
    pub fn from_medoids(medoids: &[Medoid]) -> Self {
        let mut sorted = medoids.to_vec();
        sorted.sort_by_key(|m| m.cluster);
        let points: Vec<GeoPoint> = sorted.iter().map(|m| m.point).collect();
        Self::new(&points)
    }

    pub fn len(&self) -> usize {
        self.medoids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medoids.is_empty()
    }

    /// Medoids skipped in the lookup because an earlier one sits on the
    /// same location.
    pub fn duplicates(&self) -> usize {
        self.tree.duplicates()
    }

    /// Location of a cluster's medoid.
    pub fn medoid(&self, cluster: usize) -> Option<&GeoPoint> {
        self.medoids.get(cluster)
    }

    pub fn assign(&self, point: &GeoPoint) -> Result<usize> {
        self.tree
            .nearest(&point.to_cartesian().key())
            .map_err(|_| Error::NotFound)
    }

    pub fn assign_all(&self, points: &[GeoPoint]) -> Result<Vec<ClusterAssignment>> {
        points
            .par_iter()
            .map(|p| {
                self.assign(p).map(|cluster| ClusterAssignment {
                    point: p.id,
                    cluster,
                })
            })
            .collect()
    }

    /// Records without a location get `None`.
    pub fn assign_records(&self, records: &[FeatureRecord]) -> Result<Vec<Option<ClusterAssignment>>> {
        if self.is_empty() {
            return Err(Error::NotFound);
        }
        records
            .par_iter()
            .map(|r| {
                r.location
                    .map(|p| {
                        self.assign(&p).map(|cluster| ClusterAssignment {
                            point: r.id,
                            cluster,
                        })
                    })
                    .transpose()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn medoids() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(100, 0.0, 0.0),
            GeoPoint::new(200, 45.0, 90.0),
            GeoPoint::new(300, -45.0, -90.0),
        ]
    }

    #[test]
    fn test_assign_nearest() {
        let assigner = ClusterAssigner::new(&medoids());
        assert_eq!(assigner.len(), 3);
        assert_eq!(assigner.assign(&GeoPoint::new(1, 1.0, 1.0)).unwrap(), 0);
        assert_eq!(assigner.assign(&GeoPoint::new(2, 40.0, 85.0)).unwrap(), 1);
        assert_eq!(assigner.assign(&GeoPoint::new(3, -50.0, -95.0)).unwrap(), 2);
    }

    #[test]
    fn test_medoid_lookup() {
        let assigner = ClusterAssigner::new(&medoids());
        assert_eq!(assigner.medoid(1).map(|p| p.id), Some(200));
        assert!(assigner.medoid(3).is_none());
    }

    #[test]
    fn test_empty_assigner() {
        let assigner = ClusterAssigner::new(&[]);
        assert!(matches!(
            assigner.assign(&GeoPoint::new(1, 0.0, 0.0)),
            Err(Error::NotFound)
        ));
        assert!(matches!(assigner.assign_records(&[]), Err(Error::NotFound)));
    }

    #[test]
    fn test_assign_all_keeps_order() {
        let assigner = ClusterAssigner::new(&medoids());
        let points = vec![
            GeoPoint::new(7, -44.0, -91.0),
            GeoPoint::new(8, 0.5, -0.5),
            GeoPoint::new(9, 44.0, 91.0),
        ];
        let out = assigner.assign_all(&points).unwrap();
        let clusters: Vec<usize> = out.iter().map(|a| a.cluster).collect();
        let ids: Vec<i64> = out.iter().map(|a| a.point).collect();
        assert_eq!(clusters, vec![2, 0, 1]);
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[test]
    fn test_assign_records_without_location() {
        let assigner = ClusterAssigner::new(&medoids());
        let records = vec![
            FeatureRecord {
                id: 1,
                location: Some(GeoPoint::new(1, 46.0, 89.0)),
                features: BTreeSet::new(),
            },
            FeatureRecord {
                id: 2,
                location: None,
                features: BTreeSet::new(),
            },
        ];
        let out = assigner.assign_records(&records).unwrap();
        assert_eq!(out[0], Some(ClusterAssignment { point: 1, cluster: 1 }));
        assert_eq!(out[1], None);
    }

    #[test]
    fn test_duplicate_medoids_resolve_to_first() {
        let mut points = medoids();
        points.push(GeoPoint::new(400, 0.0, 0.0));
        let assigner = ClusterAssigner::new(&points);
        assert_eq!(assigner.duplicates(), 1);
        assert_eq!(assigner.assign(&GeoPoint::new(1, 0.0, 0.0)).unwrap(), 0);
    }

    #[test]
    fn test_from_medoids_orders_by_cluster() {
        let out = vec![
            Medoid {
                cluster: 1,
                point: GeoPoint::new(200, 45.0, 90.0),
            },
            Medoid {
                cluster: 0,
                point: GeoPoint::new(100, 0.0, 0.0),
            },
        ];
        let assigner = ClusterAssigner::from_medoids(&out);
        assert_eq!(assigner.medoid(0).map(|p| p.id), Some(100));
        assert_eq!(assigner.assign(&GeoPoint::new(5, 44.0, 88.0)).unwrap(), 1);
    }
}
