pub mod dispatch;
pub mod engine;
pub mod participant;
pub mod pusher;
pub mod registry;
pub mod rpc;
pub mod session;
pub mod state_machine;

use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::engine::MediaEngine;
use crate::registry::Registry;
use crate::rpc::{RpcError, RpcServer, SignalServerConfig};

/// Bind a signaling server in front of `engine` with a fresh [`Registry`].
///
/// Returns the bound server together with the registry it serves, so the caller can observe
/// sessions while [`RpcServer::run`] drives connections.
pub async fn bind_server(
    config: SignalServerConfig,
    engine: Arc<dyn MediaEngine>,
) -> Result<(RpcServer, Arc<Registry>), RpcError> {
    let registry = Arc::new(Registry::new());
    let dispatcher = Dispatcher::new(Arc::clone(&registry), engine);
    let server = RpcServer::bind(config, Arc::new(dispatcher)).await?;
    Ok((server, registry))
}
