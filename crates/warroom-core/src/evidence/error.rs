//! Error types for evidence operations.

use thiserror::Error;

/// Errors that can occur when reading from an evidence source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvidenceError {
    /// The underlying source could not be read.
    #[error("evidence source unavailable: {reason}")]
    SourceUnavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The requested read limit is out of range.
    #[error("invalid receipt limit: {limit}")]
    InvalidLimit {
        /// The rejected limit.
        limit: usize,
    },
}
