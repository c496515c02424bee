use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An ID for a participant within a signaling namespace.
///
/// Assigned by the client at join time and used as the sole key into the
/// [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Arc<str>);

impl ParticipantId {
    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

/// An ID for the media room a participant joins.
///
/// Only forwarded to the media engine; the signaling core does not track rooms.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(Arc<str>);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}
