//! An in-process [`MediaEngine`] that negotiates without moving any media.
//!
//! Answers are derived deterministically from the offer they answer, and the
//! host drives renegotiation and candidate gathering through a
//! [`LoopbackController`]. Every call made on a participant is journaled along
//! with how many calls were in flight at once, which is what the signaling
//! tests inspect.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    EngineError, EngineEvent, IceCandidate, JoinedParticipant, MediaEngine, ParticipantHandle,
    SdpType, SessionDescription,
};
use crate::participant::RoomId;

/// Configuration for the [`LoopbackEngine`].
#[derive(Debug, Clone, Default, Builder)]
pub struct LoopbackConfig {
    /// Artificial latency added to every participant call.
    #[builder(default)]
    pub call_delay: Duration,

    /// Any description or candidate containing this marker is rejected.
    #[builder(into)]
    pub reject_marker: Option<String>,
}

impl LoopbackConfig {
    fn check(&self, payload: &str) -> Result<(), EngineError> {
        match &self.reject_marker {
            Some(marker) if payload.contains(marker.as_str()) => Err(EngineError::Rejected(
                format!("payload contains rejected marker '{marker}'"),
            )),
            _ => Ok(()),
        }
    }
}

/// A call observed on a loopback participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ApplyRemoteAnswer(SessionDescription),
    ApplyRemoteOffer(SessionDescription),
    ApplyCandidate(IceCandidate),
    Close,
}

/// Calls kept per participant; older calls are forgotten first.
const JOURNAL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct CallProbe {
    journal: Mutex<VecDeque<EngineCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closed: AtomicBool,
}

impl CallProbe {
    fn enter(&self, call: EngineCall) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(call);
        drop(journal);
        InFlight { probe: self }
    }
}

struct InFlight<'a> {
    probe: &'a CallProbe,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Host-side view of one loopback participant.
#[derive(Debug, Clone)]
pub struct LoopbackController {
    handle_id: u64,
    room: RoomId,
    events: mpsc::WeakUnboundedSender<EngineEvent>,
    probe: Arc<CallProbe>,
}

impl LoopbackController {
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Raise a renegotiation with a new local offer. Returns `false` once the
    /// participant has been closed.
    pub fn renegotiate(&self, sdp: impl Into<String>) -> bool {
        self.emit(EngineEvent::RenegotiationNeeded(SessionDescription::offer(sdp)))
    }

    /// Raise a newly gathered local candidate. Returns `false` once the
    /// participant has been closed.
    pub fn gather_candidate(&self, candidate: IceCandidate) -> bool {
        self.emit(EngineEvent::LocalCandidate(candidate))
    }

    fn emit(&self, event: EngineEvent) -> bool {
        self.events
            .upgrade()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// The most recent calls made on the participant, in the order the calls started.
    pub fn journal(&self) -> Vec<EngineCall> {
        self.probe
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// The highest number of calls that were ever running on the participant at once.
    pub fn max_in_flight(&self) -> usize {
        self.probe.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.probe.closed.load(Ordering::SeqCst)
    }

    /// Whether the participant is still held by someone and has not been closed.
    fn is_live(&self) -> bool {
        self.events.upgrade().is_some()
    }
}

/// See the [module docs](self).
#[derive(Debug, Default)]
pub struct LoopbackEngine {
    config: Arc<LoopbackConfig>,
    next_handle_id: AtomicU64,
    controllers: Mutex<Vec<LoopbackController>>,
}

impl LoopbackEngine {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config: Arc::new(config),
            next_handle_id: AtomicU64::new(0),
            controllers: Mutex::new(Vec::new()),
        }
    }

    pub fn last_controller(&self) -> Option<LoopbackController> {
        self.controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Participants that are neither closed nor dropped.
    pub fn participant_count(&self) -> usize {
        self.controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|controller| controller.is_live())
            .count()
    }
}

/// The answer a loopback participant gives to `offer`.
pub fn loopback_answer(offer: &SessionDescription) -> SessionDescription {
    SessionDescription::answer(offer.sdp.replace("a=setup:actpass", "a=setup:active"))
}

#[async_trait]
impl MediaEngine for LoopbackEngine {
    async fn create_participant(
        &self,
        room: &RoomId,
        offer: SessionDescription,
    ) -> Result<JoinedParticipant, EngineError> {
        if !self.config.call_delay.is_zero() {
            tokio::time::sleep(self.config.call_delay).await;
        }

        if offer.kind != SdpType::Offer {
            return Err(EngineError::Rejected("join requires an offer".to_string()));
        }
        self.config.check(&offer.sdp)?;

        let handle_id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let probe = Arc::new(CallProbe::default());

        let mut controllers = self.controllers.lock().unwrap_or_else(PoisonError::into_inner);
        controllers.retain(LoopbackController::is_live);
        controllers.push(LoopbackController {
            handle_id,
            room: room.clone(),
            events: events_tx.downgrade(),
            probe: Arc::clone(&probe),
        });
        drop(controllers);

        debug!(room_id = %room, handle_id, "Loopback participant created");

        Ok(JoinedParticipant {
            handle: Box::new(LoopbackParticipant {
                config: Arc::clone(&self.config),
                probe,
                events: Some(events_tx),
            }),
            answer: loopback_answer(&offer),
            events: events_rx,
        })
    }
}

struct LoopbackParticipant {
    config: Arc<LoopbackConfig>,
    probe: Arc<CallProbe>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl LoopbackParticipant {
    async fn pause(&self) {
        if self.config.call_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.call_delay).await;
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.probe.closed.load(Ordering::SeqCst) {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ParticipantHandle for LoopbackParticipant {
    async fn apply_remote_answer(
        &mut self,
        answer: SessionDescription,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;
        let probe = Arc::clone(&self.probe);
        let _in_flight = probe.enter(EngineCall::ApplyRemoteAnswer(answer.clone()));
        self.pause().await;

        if answer.kind != SdpType::Answer {
            return Err(EngineError::Rejected("expected an answer".to_string()));
        }
        self.config.check(&answer.sdp)
    }

    async fn apply_remote_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, EngineError> {
        self.ensure_open()?;
        let probe = Arc::clone(&self.probe);
        let _in_flight = probe.enter(EngineCall::ApplyRemoteOffer(offer.clone()));
        self.pause().await;

        if offer.kind != SdpType::Offer {
            return Err(EngineError::Rejected("expected an offer".to_string()));
        }
        self.config.check(&offer.sdp)?;
        Ok(loopback_answer(&offer))
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.ensure_open()?;
        let probe = Arc::clone(&self.probe);
        let _in_flight = probe.enter(EngineCall::ApplyCandidate(candidate.clone()));
        self.pause().await;

        self.config.check(&candidate.candidate)
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        let probe = Arc::clone(&self.probe);
        let _in_flight = probe.enter(EngineCall::Close);
        self.pause().await;

        self.probe.closed.store(true, Ordering::SeqCst);
        self.events = None;
        Ok(())
    }
}
