//! Error types for IGC parsing and background simplification.
//!
//! Only two things can actually fail in this crate: reading an IGC file that
//! has no usable date or too few fixes, and a background simplification job
//! that was superseded or died. Everything else (short tracks, empty time
//! ranges) returns an empty or flagged result instead of an error.

use thiserror::Error;

/// Fatal problems with an IGC file. No partial flight is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No `HFDTE` header record and no date hint supplied by the caller.
    #[error("missing flight date (no HFDTE header record)")]
    MissingDate,

    /// An `HFDTE` record is present but does not hold a valid DDMMYY date.
    #[error("invalid flight date in header: {0:?}")]
    InvalidDate(String),

    /// Fewer than two usable B-records after dropping malformed lines.
    #[error("insufficient fixes: found {found}, need at least 2")]
    InsufficientFixes { found: usize },
}

/// Failures of a background simplification job.
///
/// None of these are user-facing: the caller falls back to the full track.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimplifyError {
    /// The job was cancelled before it produced a result.
    #[error("simplification job cancelled")]
    Cancelled,

    /// A newer job was submitted; this result must be discarded.
    #[error("stale simplification result (job {job_id}, latest {latest})")]
    Stale { job_id: u64, latest: u64 },

    /// The worker task panicked or was dropped.
    #[error("simplification worker failed: {0}")]
    WorkerFailed(String),
}

/// Crate result type, defaulting to [`ParseError`].
pub type Result<T, E = ParseError> = std::result::Result<T, E>;
