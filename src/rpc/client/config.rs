use std::time::Duration;

use bon::Builder;

use crate::rpc::DEFAULT_MAX_FRAME_LENGTH;

/// Configuration for the signaling RPC client.
#[derive(Debug, Clone, Builder)]
pub struct SignalClientConfig {
    /// Address of the signaling server (e.g., "127.0.0.1:7000").
    #[builder(into)]
    pub server_addr: String,

    /// Timeout for waiting on each response.
    #[builder(default = Duration::from_secs(10))]
    pub request_timeout: Duration,

    /// Frames queued before `request` waits for the socket.
    #[builder(default = 64)]
    pub outbound_queue_capacity: usize,

    /// Longest line accepted from the server before the connection is dropped.
    #[builder(default = DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,
}

impl SignalClientConfig {
    /// Build a config from `SIGNAL_SERVER_ADDR`, defaulting to the server's default listen address.
    pub fn from_env() -> Self {
        let server_addr =
            std::env::var("SIGNAL_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:7000".to_string());
        Self::builder().server_addr(server_addr).build()
    }
}
