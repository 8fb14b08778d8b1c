//! Common error types for the rill workspace.
//!
//! The [`enum@Error`] enum provides broad categories of errors shared by
//! the lower-level crates. More specific error types (tree assembly,
//! ledger parsing, overlay) live in their own crates and convert from
//! these where needed.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for rill operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid data error.
    ///
    /// Occurs when data fails validation (wrong length, bad format,
    /// out of range).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Resource not found error.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation failed error.
    ///
    /// A catch-all for operations that fail for reasons not covered by
    /// other variants.
    #[error("operation failed: {0}")]
    OperationFailed(String),
}
