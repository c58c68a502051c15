//! Error types for the scratch storage layer.

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the record store and schema manager.
///
/// "Record not found" is not represented here: lookups return
/// `Ok(None)` so callers check absence separately from failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A conditional write matched zero rows. The supplied version is
    /// stale, or the record no longer exists; the store cannot tell
    /// the two apart without an extra lookup.
    #[error("version mismatch: record was modified or deleted concurrently")]
    VersionMismatch,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Could not obtain a connection before the pool's acquire
    /// timeout elapsed.
    #[error("storage busy: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("schema migration failed: {0}")]
    Schema(String),
}

impl StoreError {
    /// True when the error is the optimistic-concurrency rejection.
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, StoreError::VersionMismatch)
    }
}
