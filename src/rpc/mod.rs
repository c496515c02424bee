//! # rpc
//!
//! Request/response signaling over newline-delimited JSON on TCP.
//!
//! Every line is one [`Frame`]. Either side may send requests; each request is answered by a
//! response carrying the same `id`, either accepted with `data` or rejected with an
//! `errorCode`/`errorReason` pair:
//!
//! ```text
//! -> {"request":true,"id":1,"method":"join","data":{"mid":"alice","sid":"room","jsep":{...}}}
//! <- {"response":true,"id":1,"ok":true,"data":{"jsep":{...}}}
//! <- {"request":true,"id":1,"method":"trickle","data":{"mid":"alice","candidate":{...}}}
//! ```
//!
//! ## Server Side
//!
//! [`RpcServer`] accepts connections and hands every inbound request to a [`RequestHandler`] on
//! its own task, so requests are processed concurrently and complete in any order. Each
//! connection also exposes a [`Requestor`] through the [`RequestContext`] so handlers can push
//! requests back to that client later.
//!
//! ```ignore
//! let config = SignalServerConfig::builder().listen_addr("0.0.0.0:7000".to_string()).build();
//! let server = RpcServer::bind(config, Arc::new(dispatcher)).await?;
//! server.run().await?;
//! ```
//!
//! ## Client Side
//!
//! [`RpcClient`] correlates responses by id, applies a per-request timeout, and surfaces
//! requests pushed by the server as a stream.
//!
//! ```ignore
//! let mut client = RpcClient::connect(SignalClientConfig::builder().server_addr(addr).build()).await?;
//! let mut pushes = client.take_pushes().expect("pushes taken once");
//! let answer: JoinResponse = client.call("join", &join_request).await?;
//! ```

mod codec;
mod error;
mod message;

pub mod client;
pub mod server;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

pub use error::RpcError;
pub use message::{Frame, PushedRequest, Rejection, RequestFrame, ResponseFrame};

pub use client::{RpcClient, SignalClientConfig};
pub use server::{RequestHandler, RpcServer, SignalServerConfig};

/// Longest frame either side accepts unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 256 * 1024;

/// Sends requests to one remote peer without waiting for a reply.
pub trait Requestor: Send + Sync + 'static {
    /// Queue `method` with `data` for delivery. Success means the request was queued, not that
    /// it was delivered.
    fn async_request(&self, method: &str, data: Value) -> Result<(), RpcError>;
}

impl Requestor for mpsc::UnboundedSender<PushedRequest> {
    fn async_request(&self, method: &str, data: Value) -> Result<(), RpcError> {
        self.send(PushedRequest {
            method: method.to_string(),
            data,
        })
        .map_err(|_| RpcError::ConnectionClosed)
    }
}

/// What a [`RequestHandler`] knows about the connection a request arrived on.
#[derive(Clone)]
pub struct RequestContext {
    connection_id: u64,
    requestor: Arc<dyn Requestor>,
}

impl RequestContext {
    pub fn new(connection_id: u64, requestor: Arc<dyn Requestor>) -> Self {
        Self {
            connection_id,
            requestor,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// A requestor reaching back to the client that sent the request.
    pub fn requestor(&self) -> Arc<dyn Requestor> {
        Arc::clone(&self.requestor)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("connection_id", &self.connection_id)
            .field("requestor", &"<Requestor>")
            .finish()
    }
}
