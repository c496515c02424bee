//! Error types for per-participant session operations.

use crate::engine::EngineError;
use crate::participant::ParticipantId;
use crate::state_machine::negotiation::{InvalidTransition, NegotiationState};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has no engine participant to operate on: it was closed, or its join has not
    /// completed.
    #[error("participant {participant_id} is not joined (negotiation {state})")]
    NotEstablished {
        participant_id: ParticipantId,
        state: NegotiationState,
    },

    /// A required description had no SDP body.
    #[error("participant {participant_id} sent an empty session description")]
    EmptyDescription { participant_id: ParticipantId },

    /// The operation does not fit the current negotiation state.
    #[error("participant {participant_id}: {source}")]
    Negotiation {
        participant_id: ParticipantId,
        #[source]
        source: InvalidTransition,
    },

    /// The media engine failed the operation.
    #[error("participant {participant_id}: {source}")]
    Engine {
        participant_id: ParticipantId,
        #[source]
        source: EngineError,
    },
}
