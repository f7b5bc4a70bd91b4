//! Error types for warden-acl

use thiserror::Error;

/// Result type alias for warden-acl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in warden-acl.
///
/// Persistence errors carry the underlying driver error unchanged; the engine
/// performs no local retry and leaves rollback to the transaction owner.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Argument or referential error from warden-core validation.
    #[error(transparent)]
    Core(#[from] warden_core::Error),

    /// Error propagated from the persistence layer.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Uniqueness or referential constraint violated in the in-memory store.
    /// The SQL store surfaces the same conditions as [`Error::Database`].
    #[error("constraint violation: {0}")]
    Constraint(&'static str),
}

impl Error {
    /// Convenience constructor for argument errors naming a field.
    pub fn invalid_argument(field: &'static str) -> Self {
        Self::Core(warden_core::Error::InvalidArgument(field))
    }

    /// Convenience constructor for missing-reference errors naming a field.
    pub fn missing_reference(field: &'static str) -> Self {
        Self::Core(warden_core::Error::MissingReference(field))
    }
}
