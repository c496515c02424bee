//! Forwarding of engine-raised offers and candidates back to the client.

use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::Method;
use crate::dispatch::message::{NegotiationMessage, TrickleMessage};
use crate::engine::EngineEvent;
use crate::participant::ParticipantId;
use crate::rpc::Requestor;
use crate::session::Session;

/// Drains one session's [`EngineEvent`]s and pushes each as a fire-and-forget request.
///
/// The pusher holds only a weak reference to its session: it never keeps a session alive, and
/// it stops once the session is gone or the engine closes the event channel.
pub struct OutboundPusher {
    participant_id: ParticipantId,
    session: Weak<Session>,
    requestor: Arc<dyn Requestor>,
}

impl OutboundPusher {
    pub fn new(session: &Arc<Session>, requestor: Arc<dyn Requestor>) -> Self {
        Self {
            participant_id: session.participant_id().clone(),
            session: Arc::downgrade(session),
            requestor,
        }
    }

    pub fn spawn(self, events: mpsc::UnboundedReceiver<EngineEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    pub async fn run(self, mut events: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::RenegotiationNeeded(offer) => {
                    let Some(session) = self.session.upgrade() else {
                        break;
                    };
                    if !session.note_local_offer() {
                        continue;
                    }
                    drop(session);

                    self.push(
                        Method::Offer,
                        &NegotiationMessage::new(self.participant_id.clone(), offer),
                    );
                }

                EngineEvent::LocalCandidate(candidate) => {
                    self.push(
                        Method::Trickle,
                        &TrickleMessage {
                            participant_id: self.participant_id.clone(),
                            candidate,
                        },
                    );
                }
            }
        }

        debug!(participant_id = %self.participant_id, "Outbound pusher stopped");
    }

    fn push<T: Serialize>(&self, method: Method, message: &T) {
        let data = match serde_json::to_value(message) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    participant_id = %self.participant_id,
                    %method,
                    error = %e,
                    "Failed to encode push"
                );
                return;
            }
        };

        match self.requestor.async_request(method.as_str(), data) {
            Ok(()) => debug!(participant_id = %self.participant_id, %method, "Pushed to client"),
            Err(e) => {
                warn!(participant_id = %self.participant_id, %method, error = %e, "Dropped push")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::loopback::LoopbackEngine;
    use crate::engine::{IceCandidate, SessionDescription};
    use crate::participant::RoomId;
    use crate::rpc::PushedRequest;
    use crate::state_machine::negotiation::NegotiationState;

    async fn stable_session() -> Arc<Session> {
        let engine = LoopbackEngine::default();
        let session = Arc::new(Session::new(ParticipantId::from("alice")));
        session
            .join(&engine, &RoomId::from("room"), SessionDescription::offer("v=0"))
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_events_become_pushes_in_order() {
        let session = stable_session().await;
        let (push_tx, mut pushes) = mpsc::unbounded_channel::<PushedRequest>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let pusher = OutboundPusher::new(&session, Arc::new(push_tx)).spawn(events_rx);

        events_tx
            .send(EngineEvent::LocalCandidate(IceCandidate::new("candidate:1")))
            .unwrap();
        events_tx
            .send(EngineEvent::RenegotiationNeeded(SessionDescription::offer("v=0")))
            .unwrap();
        drop(events_tx);
        pusher.await.unwrap();

        let first = pushes.recv().await.unwrap();
        assert_eq!(first.method, "trickle");
        assert_eq!(
            first.data,
            json!({ "mid": "alice", "candidate": { "candidate": "candidate:1" } })
        );

        let second = pushes.recv().await.unwrap();
        assert_eq!(second.method, "offer");
        assert_eq!(session.state(), NegotiationState::Negotiating);
    }

    #[tokio::test]
    async fn test_offer_for_unnegotiable_session_is_not_pushed() {
        // Never joined, so a local offer is not valid
        let session = Arc::new(Session::new(ParticipantId::from("alice")));
        let (push_tx, mut pushes) = mpsc::unbounded_channel::<PushedRequest>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let pusher = OutboundPusher::new(&session, Arc::new(push_tx)).spawn(events_rx);
        events_tx
            .send(EngineEvent::RenegotiationNeeded(SessionDescription::offer("v=0")))
            .unwrap();
        drop(events_tx);
        pusher.await.unwrap();

        assert!(pushes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pusher_stops_when_session_dropped() {
        let session = stable_session().await;
        let (push_tx, mut pushes) = mpsc::unbounded_channel::<PushedRequest>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let pusher = OutboundPusher::new(&session, Arc::new(push_tx)).spawn(events_rx);
        drop(session);

        events_tx
            .send(EngineEvent::RenegotiationNeeded(SessionDescription::offer("v=0")))
            .unwrap();
        pusher.await.unwrap();

        assert!(pushes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_connection_does_not_stop_pusher() {
        let session = stable_session().await;
        let (push_tx, pushes) = mpsc::unbounded_channel::<PushedRequest>();
        drop(pushes);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let pusher = OutboundPusher::new(&session, Arc::new(push_tx)).spawn(events_rx);
        events_tx
            .send(EngineEvent::LocalCandidate(IceCandidate::new("candidate:1")))
            .unwrap();
        events_tx
            .send(EngineEvent::RenegotiationNeeded(SessionDescription::offer("v=0")))
            .unwrap();
        drop(events_tx);
        pusher.await.unwrap();

        // The offer was still recorded against the session
        assert_eq!(session.state(), NegotiationState::Negotiating);
    }
}
