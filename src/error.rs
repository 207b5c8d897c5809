//! Error taxonomy for the comparison and ROC runs.
//!
//! Expected absences (event not in the other stream, no candidate passing the
//! match cuts) are not errors and never reach this type.

use thiserror::Error;

/// Errors raised by the jetdiff library
#[derive(Error, Debug)]
pub enum JetDiffError {
    #[error("Stream '{stream}' has no field '{field}'")]
    MissingField { stream: String, field: String },

    #[error("Partition '{partition}' has {found} records, expected {expected} (partitions must be index-aligned)")]
    UnalignedPartitions {
        partition: String,
        expected: usize,
        found: usize,
    },

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("No candidate partition named '{0}'")]
    UnknownPartition(String),

    /// Fatal: the index handed back a record whose own event id disagrees
    /// with the lookup key.
    #[error("Corrupted event index: index[{key}] gives position {position} with event id {found}")]
    IndexCorrupted { key: i64, position: usize, found: i64 },

    #[error("Histogram '{0}' has zero total integral")]
    EmptyHistogram(String),

    #[error("Histograms '{left}' and '{right}' have different binning")]
    BinningMismatch { left: String, right: String },

    #[error("Invalid input in {source_name} line {line}: {message}")]
    Ingest {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Library result alias
pub type Result<T> = std::result::Result<T, JetDiffError>;

impl JetDiffError {
    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, JetDiffError::EmptyHistogram(_))
    }
}
