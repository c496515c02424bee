use thiserror::Error;

use super::Method;
use crate::registry::error::{ParticipantAlreadyJoined, ParticipantNotFound};
use crate::rpc::Rejection;
use crate::session::SessionError;

/// Why a signaling request failed.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Unknown method [{0}]")]
    UnknownMethod(String),

    /// The payload does not have the shape `method` expects.
    #[error("malformed {method} payload")]
    Decode {
        method: Method,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {method} response")]
    Encode {
        method: Method,
        #[source]
        source: serde_json::Error,
    },

    #[error("participant id missing")]
    MissingParticipant,

    /// A required session description is missing or has no SDP.
    #[error("{method}: jsep invalid")]
    InvalidDescription { method: Method },

    #[error(transparent)]
    NotFound(#[from] ParticipantNotFound),

    #[error(transparent)]
    AlreadyJoined(#[from] ParticipantAlreadyJoined),

    #[error("{method} failed")]
    Session {
        method: Method,
        #[source]
        source: SessionError,
    },
}

impl SignalError {
    /// The rejection sent back to the client.
    pub fn rejection(&self) -> Rejection {
        match self {
            SignalError::UnknownMethod(_) | SignalError::MissingParticipant => {
                Rejection::new(Rejection::BAD_REQUEST, self.to_string())
            }

            SignalError::Decode { method, source } => Rejection::new(
                Rejection::BAD_REQUEST,
                format!("malformed {method} payload: {source}"),
            ),

            SignalError::Encode { .. } => Rejection::new(Rejection::INTERNAL, self.to_string()),

            SignalError::InvalidDescription { .. } => {
                Rejection::new(Rejection::NEGOTIATION_FAILED, self.to_string())
            }

            SignalError::NotFound(_) => {
                Rejection::new(Rejection::NEGOTIATION_FAILED, "peer not found")
            }

            SignalError::AlreadyJoined(_) => {
                Rejection::new(Rejection::NEGOTIATION_FAILED, "peer already joined")
            }

            SignalError::Session { method, source } => {
                Rejection::new(Rejection::NEGOTIATION_FAILED, session_reason(*method, source))
            }
        }
    }
}

fn session_reason(method: Method, error: &SessionError) -> String {
    match error {
        SessionError::NotEstablished { .. } => "peer not found".to_string(),
        SessionError::EmptyDescription { .. } => format!("{method}: jsep invalid"),
        SessionError::Negotiation { source, .. } => {
            format!("{method} not allowed while negotiation is {}", source.state)
        }
        SessionError::Engine { .. } => match method {
            Method::Join => "join error".to_string(),
            Method::Offer => "answer error".to_string(),
            Method::Answer => "set remote description error".to_string(),
            Method::Trickle => "error adding ice candidate".to_string(),
            Method::Leave => "failed to close peer".to_string(),
        },
    }
}
