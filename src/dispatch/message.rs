//! Payloads of the signaling methods, field-named the way clients already send them.

use serde::{Deserialize, Serialize};

use crate::engine::{IceCandidate, SessionDescription};
use crate::participant::{ParticipantId, RoomId};

/// `join`: enter `room_id` with an initial offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "mid")]
    pub participant_id: ParticipantId,
    #[serde(rename = "sid")]
    pub room_id: RoomId,
    #[serde(rename = "jsep", default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(rename = "jsep")]
    pub answer: SessionDescription,
}

/// A description travelling either way for one participant.
///
/// Used for the client's `offer` and its response, the client's `answer`, and the server's
/// offer push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationMessage {
    #[serde(rename = "mid")]
    pub participant_id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsep: Option<SessionDescription>,
}

impl NegotiationMessage {
    pub fn new(participant_id: ParticipantId, jsep: SessionDescription) -> Self {
        Self {
            participant_id,
            jsep: Some(jsep),
        }
    }
}

/// One candidate for one participant, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickleMessage {
    #[serde(rename = "mid")]
    pub participant_id: ParticipantId,
    pub candidate: IceCandidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    #[serde(rename = "mid")]
    pub participant_id: ParticipantId,
}

/// Success payload of methods that return nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
