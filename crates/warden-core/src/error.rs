//! Error types for warden-core

use thiserror::Error;

/// Result type alias for warden-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the ACL model and argument validation.
///
/// Argument errors fail before any I/O and are never retried. Not-found
/// conditions on revoke/list/delete are *not* errors; they are answered with
/// empty results or zero counts by the engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied argument is null-like, blank, or out of range.
    /// The payload names the offending field.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A referential field points at a row that does not exist.
    /// The payload names the missing field.
    #[error("unknown reference: {0}")]
    MissingReference(&'static str),

    /// A parent-identity chain exceeded the configured depth limit,
    /// which also catches reference cycles.
    #[error("parent chain exceeds depth limit of {0}")]
    ParentDepthExceeded(usize),
}
