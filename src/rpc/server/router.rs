use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::rpc::error::RpcError;
use crate::rpc::server::config::SignalServerConfig;
use crate::rpc::server::connection::serve_connection;
use crate::rpc::server::RequestHandler;

/// Accepts signaling connections and routes their requests to a [`RequestHandler`].
pub struct RpcServer {
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    config: SignalServerConfig,
}

impl RpcServer {
    /// Bind the listener described by `config`.
    pub async fn bind(
        config: SignalServerConfig,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(&config.listen_addr).await?;

        info!(address = %listener.local_addr()?, "Signaling server bound");

        Ok(Self {
            listener,
            handler,
            config,
        })
    }

    /// The address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop.
    ///
    /// This method consumes the server and only returns if accepting fails. Connection tasks
    /// continue to run independently.
    pub async fn run(self) -> Result<(), RpcError> {
        let mut next_connection_id: u64 = 0;

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            next_connection_id += 1;
            let connection_id = next_connection_id;

            if let Err(e) = stream.set_nodelay(true) {
                warn!(connection_id, error = %e, "Failed to disable Nagle");
            }

            info!(connection_id, %peer, "Connection accepted");

            tokio::spawn(serve_connection(
                stream,
                peer,
                connection_id,
                Arc::clone(&self.handler),
                self.config.outbound_queue_capacity,
                self.config.max_frame_length,
            ));
        }
    }
}

fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
    )
}
