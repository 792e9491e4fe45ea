//! Grid clustering: bucket points into fixed lat/lon cells, one medoid per
//! occupied cell.
//!
//! The number of clusters follows from the data: a 1 x 1 degree grid has
//! 64 800 cells, only the occupied ones become clusters. Cluster ids follow
//! the cell order (south to north, then west to east), so the outcome only
//! depends on the input and the step sizes.

use super::medoid::{select_medoid, sort_members, MedoidSearch};
use super::{validate_search, Clustering, Medoid, Partition};
use crate::config::GridConfig;
use crate::error::{Error, Result};
use crate::geo::{GeoPoint, PointSet};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Grid cell index: `(floor(lat / lat_step), floor(lon / lon_step))`.
pub type CellKey = (i64, i64);

/// Smallest accepted cell size in degrees. Far below it, cell indices would
/// saturate `i64` and distinct cells would share a key.
pub const MIN_STEP: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct GridClustering {
    lat_step: f64,
    lon_step: f64,
    medoid_search: MedoidSearch,
}

impl GridClustering {
    /// Grid with the given cell size in degrees, at least [`MIN_STEP`].
    pub fn new(lat_step: f64, lon_step: f64) -> Result<Self> {
        for (name, step) in [("lat_step", lat_step), ("lon_step", lon_step)] {
            if !step.is_finite() || step < MIN_STEP {
                return Err(Error::invalid(
                    name,
                    format!("must be at least {MIN_STEP}, got {step}"),
                ));
            }
        }
        Ok(Self {
            lat_step,
            lon_step,
            medoid_search: MedoidSearch::default(),
        })
    }

    pub fn from_config(config: &GridConfig) -> Result<Self> {
        Self::new(config.lat_step, config.lon_step)?.with_medoid_search(config.medoid_search)
    }

    pub fn with_medoid_search(mut self, search: MedoidSearch) -> Result<Self> {
        validate_search(search)?;
        self.medoid_search = search;
        Ok(self)
    }

    /// Cell containing `p`.
    pub fn cell(&self, p: &GeoPoint) -> CellKey {
        (
            (p.lat / self.lat_step).floor() as i64,
            (p.lon / self.lon_step).floor() as i64,
        )
    }
}

impl Clustering for GridClustering {
    fn partition(&self, points: &[GeoPoint]) -> Result<Partition> {
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }
        let set = PointSet::new(points.to_vec());

        let mut cells: BTreeMap<CellKey, Vec<usize>> = BTreeMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(self.cell(p)).or_default().push(i);
        }
        tracing::info!(
            cells = cells.len(),
            lat_step = self.lat_step,
            lon_step = self.lon_step,
            "grid clustering"
        );

        let mut cells: Vec<(CellKey, Vec<usize>)> = cells.into_iter().collect();
        let mut labels = vec![0usize; points.len()];
        for (cluster, (_, members)) in cells.iter().enumerate() {
            for &i in members {
                labels[i] = cluster;
            }
        }

        let search = self.medoid_search;
        let medoids = cells
            .par_iter_mut()
            .enumerate()
            .map(|(cluster, (_, members))| {
                sort_members(&set, members);
                // Cells are never empty.
                let (best, _) = select_medoid(&set, members, search)
                    .ok_or(Error::EmptyInput)?;
                Ok(Medoid {
                    cluster,
                    point: *set.point(best),
                })
            })
            .collect::<Result<Vec<Medoid>>>()?;

        Ok(Partition { medoids, labels })
    }
}
