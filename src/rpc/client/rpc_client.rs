use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::rpc::client::config::SignalClientConfig;
use crate::rpc::codec::{read_frames, write_frames};
use crate::rpc::error::RpcError;
use crate::rpc::message::{Frame, PushedRequest, RequestFrame, ResponseFrame};

type PendingResponses = DashMap<u64, oneshot::Sender<ResponseFrame>, ahash::RandomState>;

/// An RPC client connected to a signaling server.
///
/// The client handles:
/// - Correlating responses with requests by id
/// - Timing out requests that are never answered
/// - Acknowledging and surfacing requests pushed by the server
///
/// # Example
///
/// ```ignore
/// let config = SignalClientConfig::builder().server_addr("127.0.0.1:7000").build();
/// let mut client = RpcClient::connect(config).await?;
///
/// let mut pushes = client.take_pushes().expect("first call");
/// tokio::spawn(async move {
///     while let Some(push) = pushes.next().await {
///         println!("{} {}", push.method, push.data);
///     }
/// });
///
/// let response: JoinResponse = client.call("join", &request).await?;
/// ```
pub struct RpcClient {
    config: SignalClientConfig,
    next_request_id: AtomicU64,
    outbound: mpsc::Sender<Frame>,
    pending: Arc<PendingResponses>,
    pushes: Option<mpsc::UnboundedReceiver<PushedRequest>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RpcClient {
    /// Connect to the server named in `config`.
    pub async fn connect(config: SignalClientConfig) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(&config.server_addr).await?;
        stream.set_nodelay(true)?;

        info!(server_addr = %config.server_addr, "Connected to signaling server");

        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingResponses::default());

        let writer = tokio::spawn(async move {
            if let Err(e) = write_frames(write_half, outbound_rx).await {
                debug!(error = %e, "Client writer stopped");
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_outbound = outbound_tx.clone();
        let max_frame_length = config.max_frame_length;
        let reader = tokio::spawn(async move {
            let frames = read_frames(read_half, max_frame_length);
            futures::pin_mut!(frames);

            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(Frame::Response(response)) => {
                        match reader_pending.remove(&response.id) {
                            Some((_, waiter)) => {
                                let _ = waiter.send(response);
                            }
                            None => debug!(id = response.id, "Response for unknown request"),
                        }
                    }

                    Ok(Frame::Request(request)) => {
                        let ack = ResponseFrame::accept(request.id, Value::Null);
                        if reader_outbound.try_send(Frame::Response(ack)).is_err() {
                            debug!(id = request.id, "Could not acknowledge server request");
                        }
                        let _ = push_tx.send(PushedRequest {
                            method: request.method,
                            data: request.data,
                        });
                    }

                    Err(e) => warn!(error = %e, "Failed to read frame from server"),
                }
            }

            debug!("Server closed the connection");
            // Dropping the waiters fails every outstanding request
            reader_pending.clear();
        });

        Ok(Self {
            config,
            next_request_id: AtomicU64::new(1),
            outbound: outbound_tx,
            pending,
            pushes: Some(push_rx),
            reader,
            writer,
        })
    }

    /// Send `method` with `data` and wait for the response payload.
    ///
    /// # Errors
    ///
    /// * [`RpcError::Rejected`] when the server rejects the request
    /// * [`RpcError::Timeout`] when no response arrives within the configured timeout
    /// * [`RpcError::ConnectionClosed`] when the connection drops first
    pub async fn request(&self, method: &str, data: Value) -> Result<Value, RpcError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (waiter_tx, waiter_rx) = oneshot::channel();
        self.pending.insert(id, waiter_tx);

        let frame = Frame::Request(RequestFrame::new(id, method, data));
        if self.outbound.send(frame).await.is_err() {
            self.pending.remove(&id);
            return Err(RpcError::ConnectionClosed);
        }

        let response = match tokio::time::timeout(self.config.request_timeout, waiter_rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(RpcError::ConnectionClosed),
            Err(elapsed) => {
                self.pending.remove(&id);
                return Err(elapsed.into());
            }
        };

        response
            .into_result()
            .map_err(|rejection| RpcError::Rejected {
                code: rejection.code,
                reason: rejection.reason,
            })
    }

    /// Typed form of [`request`](Self::request).
    pub async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let data = serde_json::to_value(request)?;
        let response = self.request(method, data).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Requests pushed by the server, in arrival order. Available once.
    pub fn take_pushes(&mut self) -> Option<UnboundedReceiverStream<PushedRequest>> {
        self.pushes.take().map(UnboundedReceiverStream::new)
    }

}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
