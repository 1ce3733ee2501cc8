//! Error kinds surfaced to callers. Input-shape errors are rejected before
//! any work starts; resource errors can surface after partial work, which
//! is always torn down completely before returning. Data-classification
//! outcomes (a column demoting to STRING) are never errors.

use thiserror::Error;

/// The four error kinds a call to [`crate::parse_bytes`] or
/// [`crate::parse_file`] can surface. No other error shapes exist: the
/// function either returns a complete, typed result or exactly one of
/// these.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Bad separator, bad `nthreads`, bad `n_header_rows`, bad flag bits,
    /// or any other caller-supplied argument that violates the input
    /// constraints validated up front.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File open/read/mmap failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Allocation failure while growing a chunk column or scratch arena.
    #[error("out of memory")]
    OutOfMemory,

    /// A `per_column_type_override` forced `INT64` on a column whose data
    /// cannot be represented as `INT64` without loss (or, for non-numeric
    /// data, at all).
    #[error("column {0} cannot satisfy its INT64 type override")]
    TypeOverrideConflict(String),
}

pub type Result<T> = std::result::Result<T, CsvError>;
