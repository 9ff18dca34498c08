use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

/// Failure signals of the estimation pipeline.
///
/// Every variant is detected eagerly and propagated to the immediate caller.
/// There is no retry or degraded path: either a call is well-formed and
/// produces a result, or it fails before any partial result exists.
#[derive(Debug, Error)]
pub enum Error {
    /// Both, or neither, of a pair of mutually exclusive options was supplied.
    #[error("options `{first}` and `{second}` are mutually exclusive, supply exactly one")]
    ExclusiveOptions {
        first: &'static str,
        second: &'static str,
    },

    /// A probability mass function with a rank this crate does not model.
    #[error("distributions of rank {rank} are not supported, expected rank 1 or 2")]
    UnsupportedRank { rank: usize },

    /// A sample and blank distribution of different ranks cannot be combined.
    #[error("sample distribution of rank {sample} cannot be calibrated against a blank of rank {blank}")]
    RankMismatch { sample: usize, blank: usize },

    /// The blank batch must match the sample batch, or hold a single item.
    #[error("blank batch of {blank} items cannot pair with sample batch of {sample} items")]
    BatchMismatch { sample: usize, blank: usize },

    /// A distribution whose total mass is not positive cannot be normalised.
    #[error("distribution has no mass")]
    EmptyDistribution,

    /// A checkpoint names a network kind outside the closed taxonomy.
    #[error("network kind `{kind}` is not supported")]
    UnsupportedNetworkKind { kind: String },

    /// The interval partition would collapse for the requested range.
    #[error("degenerate partition: boundary {lower} must lie strictly below {upper}")]
    DegenerateRange { lower: f64, upper: f64 },

    /// A tensor does not match the feature count its contract promises.
    #[error("expected {expected} features per item, found {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// A checkpoint document omits a field its network kind requires.
    #[error("checkpoint is missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("requested file {path:?} not found")]
    MissingFile { path: PathBuf },

    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed checkpoint document")]
    CheckpointDecode(#[from] toml::de::Error),

    #[error("failed to encode checkpoint document")]
    CheckpointEncode(#[from] toml::ser::Error),

    #[error("malformed distribution record")]
    Record(#[from] csv::Error),
}
