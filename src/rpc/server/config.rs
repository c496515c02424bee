use bon::Builder;

use crate::rpc::DEFAULT_MAX_FRAME_LENGTH;

/// Configuration for the signaling RPC server.
#[derive(Debug, Clone, Builder)]
pub struct SignalServerConfig {
    /// Address the server listens on (e.g., "0.0.0.0:7000").
    #[builder(default = "127.0.0.1:7000".to_string())]
    pub listen_addr: String,

    /// Frames queued per connection before pushes start being dropped.
    /// Responses wait for room instead of being dropped.
    #[builder(default = 256)]
    pub outbound_queue_capacity: usize,

    /// Longest inbound line accepted before the connection is dropped.
    #[builder(default = DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,
}

impl SignalServerConfig {
    /// Build a config from `SIGNAL_LISTEN_ADDR`, falling back to the defaults.
    pub fn from_env() -> Self {
        match std::env::var("SIGNAL_LISTEN_ADDR") {
            Ok(addr) => Self::builder().listen_addr(addr).build(),
            Err(_) => Self::builder().build(),
        }
    }
}

impl Default for SignalServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
