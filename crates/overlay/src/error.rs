//! Error types for overlay operations.

use thiserror::Error;

/// Errors that can occur during overlay operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Message decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Structurally invalid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
