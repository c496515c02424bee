use crate::participant::ParticipantId;

/// Indicates that a join failed because the participant already has a live session.
#[derive(Debug, thiserror::Error)]
#[error("participant {participant_id} already joined")]
pub struct ParticipantAlreadyJoined {
    pub participant_id: ParticipantId,
}

/// Indicates that an operation was addressed to a participant with no live session.
#[derive(Debug, thiserror::Error)]
#[error("participant {participant_id} could not be found")]
pub struct ParticipantNotFound {
    pub participant_id: ParticipantId,
}
