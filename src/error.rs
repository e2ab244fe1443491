//! Error types for the cache table
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors returned by table lookups and deletions.
///
/// Neither variant describes a transient condition: the table never retries,
/// callers decide whether absence is terminal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// Key is not in the table and no loader is configured
    #[error("key not found in cache table")]
    KeyNotFound,

    /// Key is not in the table and the configured loader returned nothing
    #[error("key not found in cache table and could not be loaded")]
    KeyNotFoundOrNotLoadable,
}

// == Result Type Alias ==
/// Convenience Result type for table operations.
pub type Result<T> = std::result::Result<T, CacheError>;
