//! Run configuration with documented defaults.
//!
//! The CLI fills these from its arguments; library users can build them
//! directly or start from `Default`.

use crate::cluster::{
    ClusteringStrategy, GridClustering, MedoidSearch, PamClustering, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MIN_IMPROVEMENT, DEFAULT_SEED,
};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::ingest::{self, FeatureRecord, FeatureRecordParser, Loaded};
use crate::vocabulary::Vocabulary;
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Input line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ParserKind {
    /// `id,lat,lon`
    #[default]
    Point,
    /// `id,<ignored>,lat,lon,...`
    Training,
    /// `id,<ignored>,lat,lon,tag tag ...`
    FeatureRecord,
}

impl FromStr for ParserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, true)
            .map_err(|_| Error::invalid("parser", format!("unknown parser kind '{s}'")))
    }
}

/// How PAM picks its initial medoids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Seeding {
    /// First k points of a seeded shuffle that sit on distinct locations.
    Random,
    /// k-means++ style D² weighted draws.
    #[default]
    PlusPlus,
}

#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    pub parser: ParserKind,
    /// Stop after this many lines.
    pub limit: Option<usize>,
    /// Selected-features file (`index<TAB>token`).
    pub vocabulary: Option<PathBuf>,
    /// Only keep the first n features of the vocabulary file.
    pub vocabulary_size: Option<usize>,
}

impl IngestConfig {
    pub fn load_vocabulary(&self) -> Result<Option<Vocabulary>> {
        self.vocabulary
            .as_ref()
            .map(|path| Vocabulary::from_tsv(path, self.vocabulary_size))
            .transpose()
    }

    pub fn load_points<P: AsRef<Path>>(&self, path: P) -> Result<Loaded<GeoPoint>> {
        ingest::load_points(path, self.parser, self.limit)
    }

    pub fn load_feature_records<P: AsRef<Path>>(&self, path: P) -> Result<Loaded<FeatureRecord>> {
        ingest::load_feature_records(path, self.load_vocabulary()?, self.limit)
    }

    /// Feature-record parser over the configured vocabulary, or an interning
    /// one when there is none.
    pub fn feature_parser(&self) -> Result<FeatureRecordParser> {
        Ok(match self.load_vocabulary()? {
            Some(vocabulary) => FeatureRecordParser::with_vocabulary(vocabulary),
            None => FeatureRecordParser::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Cell height in degrees.
    pub lat_step: f64,
    /// Cell width in degrees.
    pub lon_step: f64,
    pub medoid_search: MedoidSearch,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            lat_step: 1.0,
            lon_step: 1.0,
            medoid_search: MedoidSearch::default(),
        }
    }
}

impl GridConfig {
    pub fn build(&self) -> Result<ClusteringStrategy> {
        GridClustering::from_config(self).map(ClusteringStrategy::Grid)
    }
}

#[derive(Debug, Clone)]
pub struct PamConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub seed: u64,
    pub seeding: Seeding,
    pub medoid_search: MedoidSearch,
    /// Relative cost gain needed to move a medoid.
    pub min_improvement: f64,
}

impl Default for PamConfig {
    fn default() -> Self {
        Self {
            k: 2500,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
            seeding: Seeding::default(),
            medoid_search: MedoidSearch::default(),
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
        }
    }
}

impl PamConfig {
    pub fn build(&self) -> Result<ClusteringStrategy> {
        PamClustering::from_config(self).map(ClusteringStrategy::Pam)
    }
}
