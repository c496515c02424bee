//! Routing of inbound signaling requests to the [`Registry`] and its [`Session`]s.
//!
//! [`Method`] is the fixed vocabulary; [`Dispatcher::dispatch`] maps each method to a typed
//! handler, so a new method cannot be added without a handler for it.

pub mod error;
pub mod message;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

pub use self::error::SignalError;
use self::message::{
    Empty, JoinRequest, JoinResponse, LeaveRequest, NegotiationMessage, TrickleMessage,
};
use crate::engine::{MediaEngine, SessionDescription};
use crate::pusher::OutboundPusher;
use crate::registry::Registry;
use crate::rpc::server::RequestHandler;
use crate::rpc::{RequestContext, Rejection};
use crate::session::Session;

/// The signaling methods, named as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Enter a room with an initial offer; answered with the local answer.
    Join,
    /// A client-initiated renegotiation offer; answered with the local answer. Also the method
    /// of the server's offer push.
    Offer,
    /// The client's answer to a pushed offer.
    Answer,
    /// One connectivity candidate. Also the method of the server's candidate push.
    Trickle,
    Leave,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Join,
        Method::Offer,
        Method::Answer,
        Method::Trickle,
        Method::Leave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Join => "join",
            Method::Offer => "offer",
            Method::Answer => "answer",
            Method::Trickle => "trickle",
            Method::Leave => "leave",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| SignalError::UnknownMethod(s.to_string()))
    }
}

/// Turns inbound requests into [`Registry`] and session operations.
pub struct Dispatcher {
    registry: Arc<Registry>,
    engine: Arc<dyn MediaEngine>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("engine", &"<MediaEngine>")
            .finish()
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, engine: Arc<dyn MediaEngine>) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Decode `data` for `method`, run the matching handler and encode its result.
    ///
    /// Unknown methods and undecodable payloads fail before any session is looked up.
    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        method: &str,
        data: Value,
    ) -> Result<Value, SignalError> {
        let method: Method = method.parse()?;

        match method {
            Method::Join => route(method, data, |request| self.join(ctx, request)).await,
            Method::Offer => route(method, data, |request| self.offer(request)).await,
            Method::Answer => route(method, data, |request| self.answer(request)).await,
            Method::Trickle => route(method, data, |request| self.trickle(request)).await,
            Method::Leave => route(method, data, |request| self.leave(request)).await,
        }
    }

    async fn join(
        &self,
        ctx: &RequestContext,
        request: JoinRequest,
    ) -> Result<JoinResponse, SignalError> {
        let JoinRequest {
            participant_id,
            room_id,
            offer,
        } = request;

        info!(participant_id = %participant_id, room_id = %room_id, "Join requested");

        if participant_id.is_empty() {
            return Err(SignalError::MissingParticipant);
        }
        let offer = valid_description(Method::Join, offer)?;

        let session = self.registry.add(participant_id.clone())?;
        let rollback = JoinRollback::new(&self.registry, &session);

        let outcome = match session.join(self.engine.as_ref(), &room_id, offer).await {
            Ok(outcome) => outcome,
            Err(source) => {
                error!(participant_id = %participant_id, error = %source, "Join failed");
                return Err(SignalError::Session {
                    method: Method::Join,
                    source,
                });
            }
        };

        let pusher = OutboundPusher::new(&session, ctx.requestor()).spawn(outcome.events);
        session.attach_pusher(pusher.abort_handle());
        rollback.disarm();

        info!(
            participant_id = %participant_id,
            room_id = %room_id,
            connection_id = ctx.connection_id(),
            "Participant joined"
        );

        Ok(JoinResponse {
            answer: outcome.answer,
        })
    }

    async fn offer(&self, request: NegotiationMessage) -> Result<NegotiationMessage, SignalError> {
        info!(participant_id = %request.participant_id, "Client offer");

        let session = self.registry.get(&request.participant_id)?;
        let offer = valid_description(Method::Offer, request.jsep)?;

        let answer = session
            .answer(offer)
            .await
            .map_err(|source| SignalError::Session {
                method: Method::Offer,
                source,
            })?;

        Ok(NegotiationMessage::new(request.participant_id, answer))
    }

    async fn answer(&self, request: NegotiationMessage) -> Result<Empty, SignalError> {
        info!(participant_id = %request.participant_id, "Client answer");

        let session = self.registry.get(&request.participant_id)?;
        let answer = valid_description(Method::Answer, request.jsep)?;

        session
            .set_remote_description(answer)
            .await
            .map_err(|source| SignalError::Session {
                method: Method::Answer,
                source,
            })?;

        Ok(Empty {})
    }

    async fn trickle(&self, request: TrickleMessage) -> Result<Empty, SignalError> {
        debug!(
            participant_id = %request.participant_id,
            candidate = %request.candidate.candidate,
            "Client candidate"
        );

        let session = self.registry.get(&request.participant_id)?;

        session
            .trickle(request.candidate)
            .await
            .map_err(|source| SignalError::Session {
                method: Method::Trickle,
                source,
            })?;

        Ok(Empty {})
    }

    async fn leave(&self, request: LeaveRequest) -> Result<Empty, SignalError> {
        info!(participant_id = %request.participant_id, "Leave requested");

        let session = self.registry.get(&request.participant_id)?;
        self.registry
            .remove_generation(&request.participant_id, session.generation());

        session
            .close()
            .await
            .map_err(|source| SignalError::Session {
                method: Method::Leave,
                source,
            })?;

        info!(participant_id = %request.participant_id, "Participant left");
        Ok(Empty {})
    }
}

#[async_trait]
impl RequestHandler for Dispatcher {
    async fn handle(
        &self,
        ctx: &RequestContext,
        method: &str,
        data: Value,
    ) -> Result<Value, Rejection> {
        debug!(connection_id = ctx.connection_id(), method, "Handling request");

        self.dispatch(ctx, method, data).await.map_err(|e| {
            let rejection = e.rejection();
            warn!(
                connection_id = ctx.connection_id(),
                method,
                code = rejection.code,
                error = %e,
                "Rejecting request"
            );
            rejection
        })
    }
}

/// Unregisters and closes a joining session unless the join ran to completion.
///
/// Covers both a failed join and one whose caller stopped waiting mid-way, so no session is ever
/// left registered while `Created` or `Joining`.
struct JoinRollback {
    registry: Arc<Registry>,
    session: Arc<Session>,
    armed: bool,
}

impl JoinRollback {
    fn new(registry: &Arc<Registry>, session: &Arc<Session>) -> Self {
        Self {
            registry: Arc::clone(registry),
            session: Arc::clone(session),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for JoinRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let participant_id = self.session.participant_id();
        self.registry
            .remove_generation(participant_id, self.session.generation());
        if self.session.state().is_closed() {
            return;
        }

        warn!(participant_id = %participant_id, "Join abandoned before completing");
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(
                            participant_id = %session.participant_id(),
                            error = %e,
                            "Failed to close abandoned join"
                        );
                    }
                });
            }
            Err(_) => warn!(participant_id = %participant_id, "No runtime to close abandoned join"),
        }
    }
}

/// Decode the payload of `method`, run `handler` on it and encode what it returns.
async fn route<Req, Resp, F, Fut>(
    method: Method,
    data: Value,
    handler: F,
) -> Result<Value, SignalError>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<Resp, SignalError>>,
{
    let request = serde_json::from_value(data)
        .map_err(|source| SignalError::Decode { method, source })?;

    let response = handler(request).await?;

    serde_json::to_value(response).map_err(|source| SignalError::Encode { method, source })
}

fn valid_description(
    method: Method,
    description: Option<SessionDescription>,
) -> Result<SessionDescription, SignalError> {
    description
        .filter(|description| !description.is_empty())
        .ok_or(SignalError::InvalidDescription { method })
}
