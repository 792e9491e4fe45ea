//! Medoid clustering of geotagged points.
//!
//! Points are embedded on a sphere ([`geo`]), grouped by a fixed lat/lon
//! grid or by k-medoids ([`cluster`]), and new points are mapped to the
//! cluster of their nearest medoid through a kd-tree ([`assign`], [`index`]).
//!
//! ```no_run
//! use geomedoid::{load_points, Clustering, ClusterAssigner, GridClustering, ParserKind};
//!
//! # fn main() -> geomedoid::Result<()> {
//! let loaded = load_points("photos.csv", ParserKind::Point, None)?;
//! let grid = GridClustering::new(1.0, 1.0)?;
//! let medoids = grid.cluster(&loaded.records)?;
//!
//! let assigner = ClusterAssigner::from_medoids(&medoids);
//! let cluster = assigner.assign(&loaded.records[0])?;
//! # Ok(())
//! # }
//! ```

pub mod assign;
pub mod cluster;
pub mod config;
pub mod error;
pub mod geo;
pub mod index;
pub mod ingest;
pub mod output;
pub mod vocabulary;

pub use assign::ClusterAssigner;
pub use cluster::{
    ClusterAssignment, ClusterSummary, Clustering, ClusteringStrategy, GridClustering, Medoid,
    MedoidSearch, PamClustering, Partition,
};
pub use config::{GridConfig, IngestConfig, PamConfig, ParserKind, Seeding};
pub use error::{Error, ParseError, Result};
pub use geo::{Cartesian, GeoPoint, PointSet};
pub use index::KdTree;
pub use ingest::{
    load_feature_records, load_points, FeatureRecord, FeatureRecordParser, Ingestor, LineParser,
    Loaded, ParseStats, Parsed, PointParser,
};
pub use vocabulary::Vocabulary;
