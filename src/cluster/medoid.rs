//! Medoid selection shared by both strategies: among the members of a
//! cluster, find the one with the smallest summed distance to all others.

use crate::geo::PointSet;
use rand::prelude::*;

/// Candidates tried per cluster when sampling.
pub const DEFAULT_SAMPLE_LIMIT: usize = 512;
pub const DEFAULT_SAMPLE_SEED: u64 = 987_654_321;

/// How many members are tried as the new medoid of a cluster.
///
/// Every candidate costs one pass over the cluster, so `Exact` is quadratic
/// in the cluster size. `Sampled` bounds the number of candidates; the cost
/// of each candidate is still computed over all members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedoidSearch {
    Exact,
    Sampled { limit: usize, seed: u64 },
}

impl Default for MedoidSearch {
    fn default() -> Self {
        MedoidSearch::Sampled {
            limit: DEFAULT_SAMPLE_LIMIT,
            seed: DEFAULT_SAMPLE_SEED,
        }
    }
}

impl MedoidSearch {
    fn candidates(&self, members: &[usize]) -> Vec<usize> {
        match *self {
            MedoidSearch::Sampled { limit, seed } if members.len() > limit => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, members.len(), limit)
                    .into_iter()
                    .collect();
                picked.sort_unstable();
                picked.into_iter().map(|p| members[p]).collect()
            }
            _ => members.to_vec(),
        }
    }
}

/// Sort member indices by point id, then by position, so reductions do not
/// depend on how the members were gathered.
pub(crate) fn sort_members(set: &PointSet, members: &mut [usize]) {
    members.sort_unstable_by_key(|&i| (set.point(i).id, i));
}

/// Summed distance from `candidate` to every member.
pub(crate) fn cost(set: &PointSet, candidate: usize, members: &[usize]) -> f64 {
    let c = set.coord(candidate);
    members
        .iter()
        .map(|&m| crate::geo::distance3(&c, &set.coord(m)))
        .sum()
}

/// Cheapest candidate among `members` (expected sorted by [`sort_members`])
/// and its cost. Ties keep the earlier member.
pub(crate) fn select_medoid(
    set: &PointSet,
    members: &[usize],
    search: MedoidSearch,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for candidate in search.candidates(members) {
        let c = cost(set, candidate, members);
        if best.map_or(true, |(_, b)| c < b) {
            best = Some((candidate, c));
        }
    }
    best
}

/// Replacement for `current` if some candidate lowers the cluster cost by at
/// least `min_improvement` (relative to the new cost).
pub(crate) fn improve(
    set: &PointSet,
    members: &[usize],
    current: usize,
    search: MedoidSearch,
    min_improvement: f64,
) -> Option<usize> {
    let current_cost = cost(set, current, members);
    let (best, best_cost) = select_medoid(set, members, search)?;
    if best == current || best_cost >= current_cost {
        return None;
    }
    let gain = (current_cost - best_cost) / best_cost.max(f64::MIN_POSITIVE);
    (gain >= min_improvement).then_some(best)
}
