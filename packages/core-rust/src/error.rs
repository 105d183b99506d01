//! Structured error kinds for the ring and key-value store core.
//!
//! These are surfaced to callers as values, never as panics or process
//! termination: a fatal condition (`InvariantViolation`) is still returned
//! as a `Result`, leaving the decision to abort to the caller's supervisor.

use thiserror::Error;

/// Errors produced by the hash-ring and key-value store primitives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A hash value (or argument derived from one) fell outside `[0, 1 + eps]`,
    /// or a count argument that must be positive was zero or negative.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A `View` has no buckets registered, so no lookup can succeed.
    #[error("view has no buckets")]
    EmptyView,

    /// An operation required a non-empty set (e.g. picking a random neighbor).
    #[error("set is empty")]
    EmptySet,

    /// A `Bucket::partition_point(i)` index lookup was out of bounds.
    #[error("index {index} out of range, bucket has {len} partitions")]
    OutOfRange {
        /// requested index
        index: usize,
        /// number of partitions actually present
        len: usize,
    },

    /// A fatal, should-never-happen condition distinct from an ordinary
    /// placement miss -- `remove_bucket` finding no destination willing to
    /// accept a key is *not* this: that's an expected outcome the caller
    /// sees as `Ok(false)`. Reserved for callers layered on top of this
    /// crate that need to signal a genuine broken invariant; unconstructed
    /// anywhere in this crate today.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Convenience alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;
