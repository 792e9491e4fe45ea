//! Partitioning Around Medoids (k-medoids).
//!
//! 1. Seed k medoids on distinct locations with a seeded RNG, either
//!    k-means++ style (D² weighted draws) or the first k distinct points of a
//!    shuffle ([`Seeding`]).
//! 2. **Assign**: every point goes to its nearest medoid, looked up in a
//!    kd-tree built over the current medoids.
//! 3. **Update**: per cluster, the member with the lowest summed distance to
//!    the other members becomes the medoid (see [`MedoidSearch`]).
//! 4. Repeat until no medoid moves or the iteration budget is spent.
//!
//! Both steps run in parallel with rayon. Each step writes into its own
//! output vector, and the update step only starts on a finished assignment.
//!
//! Points on the same location always share their nearest medoid, so
//! medoids stay on distinct locations and each medoid is assigned to itself;
//! no cluster runs empty. Should one do so anyway (e.g. two medoids on the
//! same location), it is refilled by splitting the largest cluster.

use super::medoid::{improve, sort_members, MedoidSearch};
use super::{validate_search, Clustering, Medoid, Partition};
use crate::config::{PamConfig, Seeding};
use crate::error::{Error, Result};
use crate::geo::{distance3, location_key, squared_distance3, GeoPoint, PointSet};
use crate::index::KdTree;
use rand::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_SEED: u64 = 123_456_789;
/// Relative cost gain needed to move a medoid.
pub const DEFAULT_MIN_IMPROVEMENT: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct PamClustering {
    k: usize,
    max_iterations: usize,
    seed: u64,
    seeding: Seeding,
    medoid_search: MedoidSearch,
    min_improvement: f64,
}

impl PamClustering {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
            seeding: Seeding::default(),
            medoid_search: MedoidSearch::default(),
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
        }
    }

    pub fn from_config(config: &PamConfig) -> Result<Self> {
        let pam = Self::new(config.k)
            .with_max_iterations(config.max_iterations)
            .with_seed(config.seed)
            .with_seeding(config.seeding)
            .with_medoid_search(config.medoid_search)
            .with_min_improvement(config.min_improvement);
        pam.validate()?;
        Ok(pam)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Seed for the initial medoid draw.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_seeding(mut self, seeding: Seeding) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn with_medoid_search(mut self, search: MedoidSearch) -> Self {
        self.medoid_search = search;
        self
    }

    pub fn with_min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::invalid("k", "must be at least 1"));
        }
        if !self.min_improvement.is_finite() || self.min_improvement < 0.0 {
            return Err(Error::invalid(
                "min_improvement",
                format!("must be a non-negative number, got {}", self.min_improvement),
            ));
        }
        validate_search(self.medoid_search)
    }

    /// Indices of the initial medoids.
    fn init_medoids(&self, set: &PointSet) -> Result<Vec<usize>> {
        let distinct = set.distinct_locations();
        if distinct < self.k {
            return Err(Error::InsufficientData {
                requested: self.k,
                distinct,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let medoids = match self.seeding {
            Seeding::Random => self.seed_random(set, &mut rng),
            Seeding::PlusPlus => self.seed_plus_plus(set, &mut rng),
        };
        Ok(medoids)
    }

    /// First k points of a shuffle that sit on distinct locations.
    fn seed_random(&self, set: &PointSet, rng: &mut StdRng) -> Vec<usize> {
        let mut order: Vec<usize> = (0..set.len()).collect();
        order.shuffle(rng);

        let mut taken = HashSet::with_capacity(self.k);
        order
            .into_iter()
            .filter(|&i| taken.insert(location_key(&set.coord(i))))
            .take(self.k)
            .collect()
    }

    /// k-means++: each next medoid is drawn with probability proportional to
    /// its squared distance to the closest medoid so far. Locations already
    /// taken weigh zero and are never drawn again.
    fn seed_plus_plus(&self, set: &PointSet, rng: &mut StdRng) -> Vec<usize> {
        let first = rng.gen_range(0..set.len());
        let mut medoids = vec![first];
        let c = set.coord(first);
        let mut d2: Vec<f64> = (0..set.len())
            .into_par_iter()
            .map(|i| squared_distance3(&set.coord(i), &c))
            .collect();

        while medoids.len() < self.k {
            let total: f64 = d2.iter().sum();
            let threshold = rng.gen::<f64>() * total;
            let mut cumsum = 0.0;
            let mut selected = None;
            for (i, &d) in d2.iter().enumerate() {
                if d > 0.0 {
                    cumsum += d;
                    selected = Some(i);
                    if cumsum >= threshold {
                        break;
                    }
                }
            }
            // Distinct locations were counted up front, so some weight is left.
            let Some(next) = selected else { break };
            medoids.push(next);

            let c = set.coord(next);
            d2.par_iter_mut().enumerate().for_each(|(i, d)| {
                let nd = squared_distance3(&set.coord(i), &c);
                if nd < *d {
                    *d = nd;
                }
            });
        }
        medoids
    }

    fn update(&self, set: &PointSet, medoids: &[usize], labels: &[usize]) -> Vec<usize> {
        let mut members = vec![Vec::new(); medoids.len()];
        for (i, &label) in labels.iter().enumerate() {
            members[label].push(i);
        }
        members
            .into_par_iter()
            .zip(medoids.par_iter())
            .map(|(mut members, &current)| {
                sort_members(set, &mut members);
                improve(
                    set,
                    &members,
                    current,
                    self.medoid_search,
                    self.min_improvement,
                )
                .unwrap_or(current)
            })
            .collect()
    }
}

/// Nearest medoid (as cluster id) for every point.
fn assign(set: &PointSet, medoids: &[usize]) -> Result<Vec<usize>> {
    let tree = KdTree::build(
        medoids
            .iter()
            .enumerate()
            .map(|(cluster, &m)| (set.coord(m), cluster)),
    );
    (0..set.len())
        .into_par_iter()
        .map(|i| tree.nearest(&set.coord(i)))
        .collect()
}

/// Give every empty cluster a new medoid taken from the largest cluster
/// that has a member off its medoid's location: the member farthest from
/// that medoid (lowest id on ties). Returns how many clusters were refilled;
/// labels must be recomputed afterwards.
fn reseed_empty(set: &PointSet, medoids: &mut [usize], labels: &[usize]) -> usize {
    let k = medoids.len();
    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }
    let mut taken: HashSet<[u64; 3]> = medoids
        .iter()
        .map(|&m| location_key(&set.coord(m)))
        .collect();

    let mut reseeded = 0;
    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }
        let mut donors: Vec<usize> = (0..k).filter(|&c| sizes[c] > 1).collect();
        donors.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));

        for donor in donors {
            let centre = set.coord(medoids[donor]);
            let pick = (0..set.len())
                .filter(|&i| labels[i] == donor && !taken.contains(&location_key(&set.coord(i))))
                .map(|i| (distance3(&centre, &set.coord(i)), set.point(i).id, i))
                .max_by(|a, b| a.0.total_cmp(&b.0).then(b.1.cmp(&a.1)).then(b.2.cmp(&a.2)));

            if let Some((_, _, i)) = pick {
                tracing::debug!(cluster = empty, donor, point = set.point(i).id, "reseeded empty cluster");
                taken.insert(location_key(&set.coord(i)));
                medoids[empty] = i;
                sizes[donor] -= 1;
                sizes[empty] = 1;
                reseeded += 1;
                break;
            }
        }
    }
    reseeded
}

impl Clustering for PamClustering {
    fn partition(&self, points: &[GeoPoint]) -> Result<Partition> {
        self.validate()?;
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }
        let set = PointSet::new(points.to_vec());

        let mut medoids = self.init_medoids(&set)?;
        tracing::info!(k = self.k, points = set.len(), "selected initial medoids");
        let mut labels = assign(&set, &medoids)?;

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            iterations += 1;

            let reseeded = reseed_empty(&set, &mut medoids, &labels);
            if reseeded > 0 {
                labels = assign(&set, &medoids)?;
            }

            let updated = self.update(&set, &medoids, &labels);
            let swaps = medoids
                .iter()
                .zip(&updated)
                .filter(|(a, b)| a != b)
                .count();
            tracing::debug!(iteration = iterations, swaps, reseeded, "pam iteration");

            if swaps == 0 && reseeded == 0 {
                converged = true;
                break;
            }
            medoids = updated;
            labels = assign(&set, &medoids)?;
        }

        if reseed_empty(&set, &mut medoids, &labels) > 0 {
            labels = assign(&set, &medoids)?;
        }

        tracing::info!(iterations, converged, "pam finished");

        let medoids = medoids
            .iter()
            .enumerate()
            .map(|(cluster, &m)| Medoid {
                cluster,
                point: *set.point(m),
            })
            .collect();
        Ok(Partition { medoids, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use std::collections::HashSet;

    fn blobs() -> Vec<GeoPoint> {
        let centres = [(10.0, 10.0), (-30.0, 100.0), (60.0, -120.0)];
        let mut points = Vec::new();
        let mut rng = StdRng::seed_from_u64(5);
        for (c, &(lat, lon)) in centres.iter().enumerate() {
            for j in 0..40 {
                points.push(GeoPoint::new(
                    (c * 100 + j) as i64,
                    lat + rng.gen_range(-1.0..1.0),
                    lon + rng.gen_range(-1.0..1.0),
                ));
            }
        }
        points
    }

    #[test]
    fn test_recovers_blobs() {
        let points = blobs();
        let partition = PamClustering::new(3).partition(&points).unwrap();
        assert_eq!(partition.medoids.len(), 3);
        assert_eq!(partition.labels.len(), points.len());

        for blob in 0..3 {
            let label = partition.labels[blob * 40];
            assert!(partition.labels[blob * 40..(blob + 1) * 40]
                .iter()
                .all(|&l| l == label));
        }
        let distinct: HashSet<_> = partition.labels.iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_contract_k_medoids_contiguous() {
        let points = blobs();
        for k in [1, 2, 5, 17] {
            let partition = PamClustering::new(k).with_max_iterations(10).partition(&points).unwrap();
            assert_eq!(partition.medoids.len(), k);
            for (i, m) in partition.medoids.iter().enumerate() {
                assert_eq!(m.cluster, i);
            }
            assert!(partition.labels.iter().all(|&l| l < k));
            assert!(partition.sizes().iter().all(|&s| s > 0));
        }
    }

    #[test]
    fn test_medoids_are_input_points() {
        let points = blobs();
        let ids: HashSet<i64> = points.iter().map(|p| p.id).collect();
        let partition = PamClustering::new(4).partition(&points).unwrap();
        for m in &partition.medoids {
            assert!(ids.contains(&m.point.id));
        }
    }

    #[test]
    fn test_labels_are_nearest_medoid() {
        let points = blobs();
        let partition = PamClustering::new(5).partition(&points).unwrap();
        for (p, &label) in points.iter().zip(&partition.labels) {
            let c = p.to_cartesian();
            let own = c.distance(&partition.medoids[label].point.to_cartesian());
            for m in &partition.medoids {
                assert!(own <= c.distance(&m.point.to_cartesian()) + 1e-9);
            }
        }
    }

    #[test]
    fn test_reproducible() {
        let points = blobs();
        let pam = PamClustering::new(6).with_seed(99);
        let a = pam.partition(&points).unwrap();
        let b = pam.partition(&points).unwrap();
        assert_eq!(a.medoids, b.medoids);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_random_seeding() {
        let points = blobs();
        let partition = PamClustering::new(8)
            .with_seeding(Seeding::Random)
            .partition(&points)
            .unwrap();
        assert_eq!(partition.medoids.len(), 8);
        assert!(partition.sizes().iter().all(|&s| s > 0));
    }

    #[test]
    fn test_exact_search() {
        let points = blobs();
        let partition = PamClustering::new(3)
            .with_medoid_search(MedoidSearch::Exact)
            .partition(&points)
            .unwrap();
        assert_eq!(partition.medoids.len(), 3);
    }

    #[test]
    fn test_k_equals_distinct_locations() {
        let points = vec![
            GeoPoint::new(1, 0.0, 0.0),
            GeoPoint::new(2, 0.0, 0.0),
            GeoPoint::new(3, 5.0, 5.0),
            GeoPoint::new(4, -5.0, 170.0),
        ];
        let partition = PamClustering::new(3).partition(&points).unwrap();
        assert_eq!(partition.medoids.len(), 3);
        assert_eq!(partition.labels[0], partition.labels[1]);
        let distinct: HashSet<_> = partition.labels.iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_insufficient_data() {
        let points = vec![
            GeoPoint::new(1, 0.0, 0.0),
            GeoPoint::new(2, 0.0, 0.0),
            GeoPoint::new(3, 1.0, 1.0),
        ];
        let err = PamClustering::new(3).partition(&points).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                requested: 3,
                distinct: 2
            }
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let points = blobs();
        assert!(matches!(
            PamClustering::new(0).partition(&points),
            Err(Error::InvalidParameter { name: "k", .. })
        ));
        assert!(PamClustering::new(2)
            .with_medoid_search(MedoidSearch::Sampled { limit: 0, seed: 1 })
            .partition(&points)
            .is_err());
        assert!(matches!(PamClustering::new(1).partition(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_reseed_splits_largest() {
        let set = PointSet::new(vec![
            GeoPoint::new(1, 0.0, 0.0),
            GeoPoint::new(2, 0.0, 1.0),
            GeoPoint::new(3, 0.0, 5.0),
            GeoPoint::new(4, 40.0, 40.0),
        ]);
        // Cluster 1 lost all members, cluster 0 holds the first three points.
        let mut medoids = vec![0, 3, 3];
        let labels = vec![0, 0, 0, 2];
        let reseeded = reseed_empty(&set, &mut medoids, &labels);
        assert_eq!(reseeded, 1);
        assert_eq!(medoids, vec![0, 2, 3]);
    }

    #[test]
    fn test_zero_iterations_still_assigns() {
        let points = blobs();
        let partition = PamClustering::new(3).with_max_iterations(0).partition(&points).unwrap();
        assert_eq!(partition.medoids.len(), 3);
        assert_eq!(partition.labels.len(), points.len());
    }
}
