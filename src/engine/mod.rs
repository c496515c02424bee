//! The capability surface consumed from the media-transport engine.
//!
//! The signaling core never touches media. It asks the engine to create a
//! room-scoped participant, feeds it remote descriptions and candidates, and
//! drains the [`EngineEvent`]s the engine raises on its own schedule.

pub mod error;
pub mod loopback;
pub mod types;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use self::error::EngineError;
pub use self::types::{EngineEvent, IceCandidate, SdpType, SessionDescription};
use crate::participant::RoomId;

/// A freshly created engine participant.
pub struct JoinedParticipant {
    /// The handle, exclusively owned by the session that created it.
    pub handle: Box<dyn ParticipantHandle>,
    /// The local answer to the offer the participant was created with.
    pub answer: SessionDescription,
    /// Events raised by the engine for this participant until it is closed.
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl std::fmt::Debug for JoinedParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinedParticipant")
            .field("handle", &"<ParticipantHandle>")
            .field("answer", &self.answer)
            .finish_non_exhaustive()
    }
}

/// Creates participants inside a media room.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Create a participant in `room` and answer its initial `offer`.
    async fn create_participant(
        &self,
        room: &RoomId,
        offer: SessionDescription,
    ) -> Result<JoinedParticipant, EngineError>;
}

/// One joined participant's media-transport connection.
///
/// Implementations are not required to tolerate concurrent calls: the owning
/// session serializes every call on the handle.
#[async_trait]
pub trait ParticipantHandle: Send + 'static {
    /// Apply the client's answer to an offer the engine pushed earlier.
    async fn apply_remote_answer(&mut self, answer: SessionDescription)
    -> Result<(), EngineError>;

    /// Apply a client-initiated offer and produce the local answer.
    async fn apply_remote_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, EngineError>;

    async fn apply_candidate(&mut self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Release the participant. The event channel closes once this returns.
    async fn close(&mut self) -> Result<(), EngineError>;
}
