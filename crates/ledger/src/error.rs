//! Error types for ledger operations.

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while handling ledgers.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A header blob could not be parsed.
    #[error("invalid ledger header: {0}")]
    InvalidHeader(String),
}

impl From<rill_common::Error> for LedgerError {
    fn from(err: rill_common::Error) -> Self {
        LedgerError::InvalidHeader(err.to_string())
    }
}
