//! Error types for building and running a workload.

use thiserror::Error;

/// Errors that can happen while preparing or sampling a workload.
///
/// All of these are fatal at startup, before any traffic is generated.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The popularity table has fewer entries than the sampled subset requires.
    #[error("insufficient candidates: need {required} functions, table has {available}")]
    InsufficientCandidates {
        /// Number of distinct functions the subset needs.
        required: usize,
        /// Number of functions in the popularity table.
        available: usize,
    },

    /// A benchmark name that is not part of the catalog.
    #[error("unknown benchmark kind `{0}`")]
    UnknownBenchmarkKind(String),

    /// A function identifier that is not part of the sampled subset.
    #[error("function `{0}` is not part of the sampled subset")]
    UnknownFunction(String),

    /// A popularity table entry with a probability outside of `(0, 1]`.
    #[error("invalid probability {value} for function `{function}`")]
    InvalidProbability {
        /// The offending function identifier.
        function: String,
        /// The probability read from the table.
        value: f64,
    },

    /// The benchmark catalog or its copy count is unusable.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The phase schedule is empty or inconsistent.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// An invocation trace without a single invocation.
    #[error("invocation trace contains no invocations")]
    EmptyTrace,

    /// The popularity table is not valid JSON of the expected shape.
    #[error("failed to parse popularity table: {0}")]
    Table(#[from] serde_json::Error),

    /// The popularity table could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience alias that defaults our [`WorkloadError`] type.
pub type Result<T, E = WorkloadError> = std::result::Result<T, E>;
