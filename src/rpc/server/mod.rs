//! Server-side types for the signaling transport.

mod config;
mod connection;
mod router;

use async_trait::async_trait;
use serde_json::Value;

pub use config::SignalServerConfig;
pub use connection::ConnectionRequestor;
pub use router::RpcServer;

use crate::rpc::RequestContext;
use crate::rpc::message::Rejection;

/// Handles one inbound request and decides its response.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        ctx: &RequestContext,
        method: &str,
        data: Value,
    ) -> Result<Value, Rejection>;
}
