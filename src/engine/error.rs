//! Error types for the media engine boundary.

/// A media engine refused or failed an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine rejected the description or candidate it was given.
    #[error("media engine rejected the request: {0}")]
    Rejected(String),

    /// The participant handle was already closed.
    #[error("participant handle is closed")]
    Closed,
}
