pub mod error;

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub use self::error::SessionError;
use crate::engine::{
    EngineError, EngineEvent, IceCandidate, JoinedParticipant, MediaEngine, ParticipantHandle,
    SessionDescription,
};
use crate::participant::{ParticipantId, RoomId};
use crate::state_machine::negotiation::{
    InvalidTransition, NegotiationInput, NegotiationMachine, NegotiationState,
};

/// Distinguishes one session from any later session registered under the same participant id.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct SessionGeneration(Uuid);

impl SessionGeneration {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionGeneration({})", self.0)
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a successful [`Session::join`].
#[derive(Debug)]
pub struct JoinOutcome {
    /// The local answer to hand back to the joining client.
    pub answer: SessionDescription,
    /// Engine events for this participant, to be drained by an
    /// [`OutboundPusher`](crate::pusher::OutboundPusher).
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

#[derive(Default)]
struct MediaSlot {
    handle: Option<Box<dyn ParticipantHandle>>,
    /// Remote candidates that arrived before the engine participant existed.
    pending_candidates: Vec<IceCandidate>,
}

/// One participant's negotiation with the media engine.
///
/// Every operation that reaches the engine holds the media lock for the whole engine call, so
/// operations on one session run one at a time in the order they acquired it. The negotiation
/// state sits behind its own short-lived lock so engine-raised events can advance it without
/// waiting for an in-flight request.
pub struct Session {
    participant_id: ParticipantId,
    generation: SessionGeneration,
    negotiation: Mutex<NegotiationMachine>,
    media: tokio::sync::Mutex<MediaSlot>,
    pusher: Mutex<Option<AbortHandle>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("participant_id", &self.participant_id)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .field("media", &"<MediaSlot>")
            .finish()
    }
}

impl Session {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            generation: SessionGeneration::generate(),
            negotiation: Mutex::new(NegotiationMachine::new()),
            media: tokio::sync::Mutex::new(MediaSlot::default()),
            pusher: Mutex::new(None),
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn generation(&self) -> &SessionGeneration {
        &self.generation
    }

    pub fn state(&self) -> NegotiationState {
        self.negotiation().state()
    }

    /// Create the engine participant in `room` from the client's initial `offer`.
    ///
    /// On engine failure the session ends up closed; it never holds a half-created participant.
    pub async fn join(
        &self,
        engine: &dyn MediaEngine,
        room: &RoomId,
        offer: SessionDescription,
    ) -> Result<JoinOutcome, SessionError> {
        if offer.is_empty() {
            return Err(self.empty_description());
        }

        let mut media = self.media.lock().await;
        self.advance(NegotiationInput::BeginJoin)?;

        let JoinedParticipant {
            handle,
            answer,
            events,
        } = match engine.create_participant(room, offer).await {
            Ok(joined) => joined,
            Err(source) => {
                let _ = self.advance(NegotiationInput::JoinFailed);
                return Err(self.engine_error(source));
            }
        };

        // Stored before any further await so an abandoned join still leaves the handle to close
        let slot = &mut *media;
        let handle = slot.handle.insert(handle);
        for candidate in std::mem::take(&mut slot.pending_candidates) {
            if let Err(e) = handle.apply_candidate(candidate).await {
                warn!(
                    participant_id = %self.participant_id,
                    error = %e,
                    "Dropping buffered candidate rejected by engine"
                );
            }
        }

        self.advance(NegotiationInput::JoinCompleted)?;

        Ok(JoinOutcome { answer, events })
    }

    /// Apply a client-initiated `offer` and produce the local answer.
    pub async fn answer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError> {
        if offer.is_empty() {
            return Err(self.empty_description());
        }

        let mut media = self.media.lock().await;
        let handle = self.established(&mut media)?;
        self.check(NegotiationInput::RemoteOffer)?;

        let answer = handle
            .apply_remote_offer(offer)
            .await
            .map_err(|source| self.engine_error(source))?;

        self.advance(NegotiationInput::RemoteOffer)?;
        Ok(answer)
    }

    /// Apply the client's `answer` to the offer last pushed by the engine.
    pub async fn set_remote_description(
        &self,
        answer: SessionDescription,
    ) -> Result<(), SessionError> {
        if answer.is_empty() {
            return Err(self.empty_description());
        }

        let mut media = self.media.lock().await;
        let handle = self.established(&mut media)?;
        self.check(NegotiationInput::RemoteAnswer)?;

        handle
            .apply_remote_answer(answer)
            .await
            .map_err(|source| self.engine_error(source))?;

        self.advance(NegotiationInput::RemoteAnswer)
    }

    /// Apply one remote `candidate`, whatever the negotiation phase.
    ///
    /// Candidates that arrive before the engine participant exists are held and applied as soon
    /// as the join creates it.
    pub async fn trickle(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        let mut media = self.media.lock().await;

        match self.state() {
            NegotiationState::Closed => Err(self.not_established(NegotiationState::Closed)),

            NegotiationState::Created | NegotiationState::Joining => {
                debug!(participant_id = %self.participant_id, "Buffering early candidate");
                media.pending_candidates.push(candidate);
                Ok(())
            }

            NegotiationState::Stable | NegotiationState::Negotiating => {
                let handle = self.established(&mut media)?;
                handle
                    .apply_candidate(candidate)
                    .await
                    .map_err(|source| self.engine_error(source))
            }
        }
    }

    /// Close the session and release its engine participant.
    ///
    /// Closing a closed session does nothing.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut media = self.media.lock().await;
        if self.state().is_closed() {
            return Ok(());
        }

        self.advance(NegotiationInput::Close)?;

        if let Some(pusher) = self.pusher_slot().take() {
            pusher.abort();
        }
        media.pending_candidates.clear();

        match media.handle.take() {
            Some(mut handle) => handle
                .close()
                .await
                .map_err(|source| self.engine_error(source)),
            None => Ok(()),
        }
    }

    /// Record that the engine produced a new offer for the client.
    ///
    /// Returns `false` when the offer should not be pushed because the session is no longer
    /// negotiable.
    pub fn note_local_offer(&self) -> bool {
        match self.negotiation().transition(NegotiationInput::LocalOffer) {
            Ok((from, to)) => {
                debug!(participant_id = %self.participant_id, %from, %to, "Local offer pending");
                true
            }
            Err(e) => {
                debug!(participant_id = %self.participant_id, error = %e, "Local offer ignored");
                false
            }
        }
    }

    /// Tie the task pushing this session's engine events to the session's lifetime.
    pub fn attach_pusher(&self, pusher: AbortHandle) {
        let mut slot = self.pusher_slot();
        if self.state().is_closed() {
            pusher.abort();
        } else if let Some(previous) = slot.replace(pusher) {
            previous.abort();
        }
    }

    fn established<'a>(
        &self,
        media: &'a mut MediaSlot,
    ) -> Result<&'a mut Box<dyn ParticipantHandle>, SessionError> {
        let state = self.state();
        if !state.is_established() {
            return Err(self.not_established(state));
        }
        media
            .handle
            .as_mut()
            .ok_or_else(|| self.not_established(state))
    }

    fn check(&self, input: NegotiationInput) -> Result<(), SessionError> {
        let negotiation = self.negotiation();
        if negotiation.accepts(input) {
            Ok(())
        } else {
            Err(SessionError::Negotiation {
                participant_id: self.participant_id.clone(),
                source: InvalidTransition {
                    input,
                    state: negotiation.state(),
                },
            })
        }
    }

    fn advance(&self, input: NegotiationInput) -> Result<(), SessionError> {
        let (from, to) = self
            .negotiation()
            .transition(input)
            .map_err(|source| SessionError::Negotiation {
                participant_id: self.participant_id.clone(),
                source,
            })?;
        debug!(participant_id = %self.participant_id, %from, %to, "Negotiation advanced");
        Ok(())
    }

    fn negotiation(&self) -> MutexGuard<'_, NegotiationMachine> {
        self.negotiation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pusher_slot(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.pusher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_established(&self, state: NegotiationState) -> SessionError {
        SessionError::NotEstablished {
            participant_id: self.participant_id.clone(),
            state,
        }
    }

    fn empty_description(&self) -> SessionError {
        SessionError::EmptyDescription {
            participant_id: self.participant_id.clone(),
        }
    }

    fn engine_error(&self, source: EngineError) -> SessionError {
        SessionError::Engine {
            participant_id: self.participant_id.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::engine::loopback::{EngineCall, LoopbackConfig, LoopbackEngine, loopback_answer};

    const OFFER: &str = "v=0\r\na=setup:actpass\r\n";

    async fn joined_session(engine: &LoopbackEngine) -> (Session, JoinOutcome) {
        let session = Session::new(ParticipantId::from("alice"));
        let outcome = session
            .join(engine, &RoomId::from("room"), SessionDescription::offer(OFFER))
            .await
            .unwrap();
        (session, outcome)
    }

    #[tokio::test]
    async fn test_join_returns_engine_answer() {
        let engine = LoopbackEngine::default();
        let (session, outcome) = joined_session(&engine).await;

        assert_eq!(
            outcome.answer,
            loopback_answer(&SessionDescription::offer(OFFER))
        );
        assert_eq!(session.state(), NegotiationState::Stable);
    }

    #[tokio::test]
    async fn test_join_rejects_empty_offer() {
        let engine = LoopbackEngine::default();
        let session = Session::new(ParticipantId::from("alice"));

        let result = session
            .join(&engine, &RoomId::from("room"), SessionDescription::offer(""))
            .await;

        assert!(matches!(result, Err(SessionError::EmptyDescription { .. })));
        assert_eq!(session.state(), NegotiationState::Created);
        assert_eq!(engine.participant_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_join_closes_session() {
        let engine = LoopbackEngine::new(LoopbackConfig::builder().reject_marker("bad").build());
        let session = Session::new(ParticipantId::from("alice"));

        let result = session
            .join(&engine, &RoomId::from("room"), SessionDescription::offer("v=0 bad"))
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Engine {
                source: EngineError::Rejected(_),
                ..
            })
        ));
        assert!(session.state().is_closed());

        let trickle = session.trickle(IceCandidate::new("candidate:1")).await;
        assert!(matches!(trickle, Err(SessionError::NotEstablished { .. })));
    }

    #[tokio::test]
    async fn test_client_offer_is_answered() {
        let engine = LoopbackEngine::default();
        let (session, _outcome) = joined_session(&engine).await;

        let renegotiation = SessionDescription::offer("v=0\r\na=setup:actpass\r\nm=video\r\n");
        let answer = session.answer(renegotiation.clone()).await.unwrap();

        assert_eq!(answer, loopback_answer(&renegotiation));
        assert_eq!(
            engine.last_controller().unwrap().journal(),
            vec![EngineCall::ApplyRemoteOffer(renegotiation)]
        );
    }

    #[tokio::test]
    async fn test_remote_answer_requires_pushed_offer() {
        let engine = LoopbackEngine::default();
        let (session, _outcome) = joined_session(&engine).await;

        let premature = session
            .set_remote_description(SessionDescription::answer("v=0"))
            .await;
        assert!(matches!(premature, Err(SessionError::Negotiation { .. })));
        assert!(engine.last_controller().unwrap().journal().is_empty());

        assert!(session.note_local_offer());
        assert_eq!(session.state(), NegotiationState::Negotiating);

        session
            .set_remote_description(SessionDescription::answer("v=0"))
            .await
            .unwrap();
        assert_eq!(session.state(), NegotiationState::Stable);
    }

    #[tokio::test]
    async fn test_failed_remote_answer_keeps_state() {
        let engine = LoopbackEngine::new(LoopbackConfig::builder().reject_marker("bad").build());
        let (session, _outcome) = joined_session(&engine).await;
        session.note_local_offer();

        let result = session
            .set_remote_description(SessionDescription::answer("v=0 bad"))
            .await;

        assert!(matches!(result, Err(SessionError::Engine { .. })));
        assert_eq!(session.state(), NegotiationState::Negotiating);
    }

    #[tokio::test]
    async fn test_early_candidates_applied_after_join() {
        let engine = LoopbackEngine::default();
        let session = Session::new(ParticipantId::from("alice"));

        session.trickle(IceCandidate::new("candidate:1")).await.unwrap();
        session.trickle(IceCandidate::new("candidate:2")).await.unwrap();

        session
            .join(&engine, &RoomId::from("room"), SessionDescription::offer(OFFER))
            .await
            .unwrap();

        assert_eq!(
            engine.last_controller().unwrap().journal(),
            vec![
                EngineCall::ApplyCandidate(IceCandidate::new("candidate:1")),
                EngineCall::ApplyCandidate(IceCandidate::new("candidate:2")),
            ]
        );
    }

    #[tokio::test]
    async fn test_abandoned_join_keeps_handle_for_close() {
        let engine = LoopbackEngine::new(
            LoopbackConfig::builder()
                .call_delay(Duration::from_millis(100))
                .build(),
        );
        let session = Session::new(ParticipantId::from("alice"));
        session.trickle(IceCandidate::new("candidate:1")).await.unwrap();

        // Times out while the buffered candidate is being applied
        let room = RoomId::from("room");
        let join = session.join(&engine, &room, SessionDescription::offer(OFFER));
        assert!(
            tokio::time::timeout(Duration::from_millis(150), join)
                .await
                .is_err()
        );

        let controller = engine.last_controller().unwrap();
        assert_eq!(engine.participant_count(), 1);
        assert!(!controller.is_closed());

        session.close().await.unwrap();
        assert!(controller.is_closed());
        assert!(session.state().is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let engine = LoopbackEngine::default();
        let (session, mut outcome) = joined_session(&engine).await;
        let controller = engine.last_controller().unwrap();

        session.close().await.unwrap();
        session.close().await.unwrap();

        assert!(controller.is_closed());
        assert_eq!(controller.journal(), vec![EngineCall::Close]);
        assert!(outcome.events.recv().await.is_none());

        let answer = session.answer(SessionDescription::offer(OFFER)).await;
        assert!(matches!(answer, Err(SessionError::NotEstablished { .. })));
        assert!(!session.note_local_offer());
    }

    #[tokio::test]
    async fn test_concurrent_operations_run_one_at_a_time() {
        let engine = LoopbackEngine::new(
            LoopbackConfig::builder()
                .call_delay(Duration::from_millis(2))
                .build(),
        );
        let (session, _outcome) = joined_session(&engine).await;
        let session = Arc::new(session);

        let mut tasks = Vec::new();
        for i in 0..12 {
            let session = Arc::clone(&session);
            tasks.push(tokio::spawn(async move {
                if i % 3 == 0 {
                    session
                        .answer(SessionDescription::offer(format!("v=0 renegotiate {i}")))
                        .await
                        .map(|_| ())
                } else {
                    session
                        .trickle(IceCandidate::new(format!("candidate:{i}")))
                        .await
                }
            }));
        }

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let controller = engine.last_controller().unwrap();
        assert_eq!(controller.journal().len(), 12);
        assert_eq!(controller.max_in_flight(), 1);
        assert_eq!(session.state(), NegotiationState::Stable);
    }
}
