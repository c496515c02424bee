use anyhow::Result;
use sfu_signal::bind_server;
use sfu_signal::engine::loopback::LoopbackEngine;
use sfu_signal::rpc::SignalServerConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SignalServerConfig::from_env();

    // No media plane is wired in yet; the loopback engine answers every offer locally.
    let engine = Arc::new(LoopbackEngine::default());
    let (server, registry) = bind_server(config, engine).await?;

    info!(address = %server.local_addr()?, "Waiting for participants...");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!(participants = registry.len(), "Shutting down");
        }
    }

    Ok(())
}
