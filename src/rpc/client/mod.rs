//! Client-side types for the signaling transport.
//!
//! The [`RpcClient`] is what a participant process (or a test) uses to talk to a signaling
//! server: request/response calls for join/offer/answer/trickle/leave, plus the stream of offers
//! and candidates the server pushes back.

mod config;
mod rpc_client;

pub use config::SignalClientConfig;
pub use rpc_client::RpcClient;
