use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::rpc::codec::{read_frames, write_frames};
use crate::rpc::error::RpcError;
use crate::rpc::message::{Frame, RequestFrame, ResponseFrame};
use crate::rpc::server::RequestHandler;
use crate::rpc::{RequestContext, Requestor};

/// Pushes server-initiated requests onto one connection's outbound queue.
#[derive(Debug)]
pub struct ConnectionRequestor {
    connection_id: u64,
    next_request_id: AtomicU64,
    outbound: mpsc::Sender<Frame>,
}

impl ConnectionRequestor {
    pub(crate) fn new(connection_id: u64, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            connection_id,
            next_request_id: AtomicU64::new(1),
            outbound,
        }
    }
}

impl Requestor for ConnectionRequestor {
    fn async_request(&self, method: &str, data: Value) -> Result<(), RpcError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::Request(RequestFrame::new(id, method, data));

        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RpcError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => RpcError::ConnectionClosed,
        })?;

        debug!(connection_id = self.connection_id, id, method, "Queued server request");
        Ok(())
    }
}

/// Serve one client connection until it closes.
///
/// Inbound requests each run on their own task. Responses and server pushes share a single
/// writer task so frames never interleave on the socket.
pub(crate) async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connection_id: u64,
    handler: Arc<dyn RequestHandler>,
    queue_capacity: usize,
    max_frame_length: usize,
) {
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity.max(1));

    let writer = tokio::spawn(async move {
        if let Err(e) = write_frames(write_half, outbound_rx).await {
            debug!(connection_id, error = %e, "Connection writer stopped");
        }
    });

    let requestor = Arc::new(ConnectionRequestor::new(connection_id, outbound_tx.clone()));
    let ctx = RequestContext::new(connection_id, requestor);

    let frames = read_frames(read_half, max_frame_length);
    futures::pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Frame::Request(request)) => {
                let handler = Arc::clone(&handler);
                let ctx = ctx.clone();
                let outbound = outbound_tx.clone();
                tokio::spawn(async move {
                    respond(handler.as_ref(), &ctx, request, outbound).await;
                });
            }

            Ok(Frame::Response(response)) => {
                // Pushes expect no reply; acknowledgements are only logged
                debug!(
                    connection_id,
                    id = response.id,
                    ok = response.ok,
                    "Client acknowledged server request"
                );
            }

            Err(RpcError::Json(e)) => {
                warn!(connection_id, %peer, error = %e, "Discarding malformed frame");
            }

            Err(e) => {
                warn!(connection_id, %peer, error = %e, "Connection read failed");
            }
        }
    }

    info!(connection_id, %peer, "Connection closed");
    writer.abort();
}

async fn respond(
    handler: &dyn RequestHandler,
    ctx: &RequestContext,
    request: RequestFrame,
    outbound: mpsc::Sender<Frame>,
) {
    let RequestFrame {
        id, method, data, ..
    } = request;

    let response = match handler.handle(ctx, &method, data).await {
        Ok(data) => ResponseFrame::accept(id, data),
        Err(rejection) => {
            debug!(
                connection_id = ctx.connection_id(),
                id,
                method = %method,
                code = rejection.code,
                reason = %rejection.reason,
                "Request rejected"
            );
            ResponseFrame::reject(id, rejection)
        }
    };

    if outbound.send(Frame::Response(response)).await.is_err() {
        debug!(
            connection_id = ctx.connection_id(),
            id, "Connection closed before response was sent"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_requestor_numbers_requests() {
        let (tx, mut rx) = mpsc::channel(4);
        let requestor = ConnectionRequestor::new(1, tx);

        requestor.async_request("offer", json!({ "mid": "a" })).unwrap();
        requestor.async_request("trickle", json!({ "mid": "a" })).unwrap();

        let Some(Frame::Request(first)) = rx.recv().await else {
            panic!("expected a request frame");
        };
        let Some(Frame::Request(second)) = rx.recv().await else {
            panic!("expected a request frame");
        };
        assert_eq!((first.id, first.method.as_str()), (1, "offer"));
        assert_eq!((second.id, second.method.as_str()), (2, "trickle"));
    }

    #[tokio::test]
    async fn test_requestor_reports_full_and_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        let requestor = ConnectionRequestor::new(1, tx);

        requestor.async_request("trickle", Value::Null).unwrap();
        assert!(matches!(
            requestor.async_request("trickle", Value::Null),
            Err(RpcError::QueueFull)
        ));

        drop(rx);
        assert!(matches!(
            requestor.async_request("trickle", Value::Null),
            Err(RpcError::ConnectionClosed)
        ));
    }
}
