use thiserror::Error;

/// Errors that can occur in the signaling RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Socket level failure.
    #[error("transport IO error")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded as JSON.
    #[error("malformed frame")]
    Json(#[from] serde_json::Error),

    /// The connection's outbound queue is full; the frame was dropped.
    #[error("outbound queue full")]
    QueueFull,

    /// A line grew past the frame limit before its newline arrived.
    #[error("frame exceeds {0} bytes")]
    FrameTooLong(usize),

    /// The RPC connection was closed.
    #[error("RPC connection closed")]
    ConnectionClosed,

    /// Timeout waiting for a response.
    #[error("timeout waiting for response")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// The peer rejected the request.
    #[error("request rejected ({code}): {reason}")]
    Rejected { code: u16, reason: String },
}
