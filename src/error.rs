use std::path::PathBuf;
use thiserror::Error;

/// Result alias for `geomedoid`.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural failures surfaced to the caller.
///
/// Per-line problems during ingestion are [`ParseError`]s and never end up
/// here; they are counted by the loader instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Clustering was asked to work on an empty point set.
    #[error("empty input provided")]
    EmptyInput,

    /// A nearest-neighbour query hit an index without entries.
    #[error("nearest-neighbour query against an empty index")]
    EmptyIndex,

    /// Fewer distinct locations than requested clusters.
    #[error("cannot create {requested} clusters from {distinct} distinct locations")]
    InsufficientData { requested: usize, distinct: usize },

    /// Assignment against an empty medoid set.
    #[error("no medoids to assign against")]
    NotFound,

    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    /// Input could not be opened at all. Fatal for the whole run.
    #[error("failed to open {path:?}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

/// Recoverable failure on a single input line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("missing field {index}")]
    MissingField { index: usize },

    #[error("field {index}: '{value}' is not a number")]
    InvalidNumber { index: usize, value: String },

    #[error("field {index}: {value} outside [{min}, {max}]")]
    OutOfRange {
        index: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("line is not valid UTF-8")]
    Encoding,
}
