//! Balanced kd-tree over embedded points, for exact 1-nearest-neighbour
//! lookups.
//!
//! The tree is laid out implicitly in one `Vec`: every subslice stores the
//! median along its split axis (x, y, z by depth) at its middle position, the
//! lower half to the left and the upper half to the right. It is built once
//! and never mutated, so it can be shared across threads for queries.

use crate::error::{Error, Result};
use crate::geo::{location_key, squared_distance3};
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct Node<T> {
    key: [f64; 3],
    payload: T,
    /// Insertion position, used to break distance ties.
    order: usize,
}

/// Best match so far during a query.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    d2: f64,
    order: usize,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct KdTree<T> {
    nodes: Vec<Node<T>>,
    duplicates: usize,
}

impl<T: Copy> KdTree<T> {
    /// Build the tree from `(coordinate, payload)` pairs.
    ///
    /// An item whose coordinate was already inserted is skipped and counted,
    /// see [`KdTree::duplicates`]. The first occurrence keeps its payload.
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator<Item = ([f64; 3], T)>,
    {
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        let mut nodes = Vec::new();

        for (key, payload) in items {
            if !seen.insert(location_key(&key)) {
                duplicates += 1;
                continue;
            }
            let order = nodes.len();
            nodes.push(Node {
                key,
                payload,
                order,
            });
        }

        if duplicates > 0 {
            tracing::warn!(duplicates, "skipped duplicate keys while building index");
        }

        Self::partition(&mut nodes, 0);
        Self { nodes, duplicates }
    }

    fn partition(nodes: &mut [Node<T>], depth: usize) {
        if nodes.len() <= 1 {
            return;
        }
        let axis = depth % 3;
        let mid = nodes.len() / 2;
        nodes.select_nth_unstable_by(mid, |a, b| {
            a.key[axis]
                .total_cmp(&b.key[axis])
                .then(a.order.cmp(&b.order))
        });
        let (left, right) = nodes.split_at_mut(mid);
        Self::partition(left, depth + 1);
        Self::partition(&mut right[1..], depth + 1);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Items skipped at build time because their coordinate was taken.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Payload of the stored point closest to `query`.
    ///
    /// Equal distances go to the item inserted first.
    pub fn nearest(&self, query: &[f64; 3]) -> Result<T> {
        self.nearest_with_distance(query).map(|(payload, _)| payload)
    }

    /// Like [`KdTree::nearest`], also returning the Euclidean distance.
    pub fn nearest_with_distance(&self, query: &[f64; 3]) -> Result<(T, f64)> {
        if self.nodes.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let mut best = Candidate {
            d2: f64::INFINITY,
            order: usize::MAX,
            index: 0,
        };
        self.search(0, self.nodes.len(), 0, query, &mut best);
        Ok((self.nodes[best.index].payload, best.d2.sqrt()))
    }

    fn search(&self, lo: usize, hi: usize, depth: usize, q: &[f64; 3], best: &mut Candidate) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let node = &self.nodes[mid];

        let d2 = squared_distance3(&node.key, q);
        if d2 < best.d2 || (d2 == best.d2 && node.order < best.order) {
            *best = Candidate {
                d2,
                order: node.order,
                index: mid,
            };
        }

        let axis = depth % 3;
        let diff = q[axis] - node.key[axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search(near.0, near.1, depth + 1, q, best);
        // `<=` keeps equal-distance points reachable for the tie-break.
        if diff * diff <= best.d2 {
            self.search(far.0, far.1, depth + 1, q, best);
        }
    }
}
