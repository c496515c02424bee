use std::sync::Arc;

use dashmap::{DashMap, Entry};

use self::error::{ParticipantAlreadyJoined, ParticipantNotFound};
pub use crate::participant::ParticipantId;
use crate::session::{Session, SessionGeneration};

pub mod error;

/// The live [`Session`]s of one signaling node, keyed by [`ParticipantId`].
///
/// The registry is the only owner that keeps a session reachable: once an entry is removed no
/// new request can find it, and any in-flight request still holding it observes it closing.
/// Entries are never dropped implicitly.
#[derive(Debug)]
pub struct Registry {
    sessions: DashMap<ParticipantId, Arc<Session>, ahash::RandomState>,
}

impl Registry {
    /// Construct a new empty [`Registry`].
    pub fn new() -> Registry {
        Self::default()
    }

    /// Create and register a new [`Session`] for `participant_id`.
    ///
    /// A participant with a live session cannot be added again; the existing session is left
    /// untouched.
    pub fn add(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Arc<Session>, ParticipantAlreadyJoined> {
        match self.sessions.entry(participant_id) {
            Entry::Occupied(entry) => Err(ParticipantAlreadyJoined {
                participant_id: entry.key().clone(),
            }),

            Entry::Vacant(slot) => {
                let session = Arc::new(Session::new(slot.key().clone()));
                slot.insert(Arc::clone(&session));
                Ok(session)
            }
        }
    }

    /// Look up the live session for `participant_id`.
    pub fn get(&self, participant_id: &ParticipantId) -> Result<Arc<Session>, ParticipantNotFound> {
        self.sessions
            .get(participant_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ParticipantNotFound {
                participant_id: participant_id.clone(),
            })
    }

    /// Unregister the session for `participant_id`, returning it if one was present.
    pub fn remove(&self, participant_id: &ParticipantId) -> Option<Arc<Session>> {
        self.sessions
            .remove(participant_id)
            .map(|(_, session)| session)
    }

    /// Unregister the session for `participant_id` only if it is still the one identified by
    /// `generation`.
    pub fn remove_generation(
        &self,
        participant_id: &ParticipantId,
        generation: &SessionGeneration,
    ) -> Option<Arc<Session>> {
        self.sessions
            .remove_if(participant_id, |_, session| session.generation() == generation)
            .map(|(_, session)| session)
    }

    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.sessions.contains_key(participant_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            sessions: DashMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_session() {
        let registry = Registry::new();
        let participant_id = ParticipantId::from("alice");

        let session = registry.add(participant_id.clone()).unwrap();
        assert_eq!(session.participant_id(), &participant_id);
        assert!(registry.contains(&participant_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_add_error() {
        let registry = Registry::new();
        let participant_id = ParticipantId::from("alice");

        let first = registry.add(participant_id.clone()).unwrap();

        // Second attempt should fail and leave the first in place
        let result = registry.add(participant_id.clone());
        assert!(matches!(result, Err(ParticipantAlreadyJoined { .. })));

        let current = registry.get(&participant_id).unwrap();
        assert_eq!(current.generation(), first.generation());
    }

    #[test]
    fn test_get_unknown_participant() {
        let registry = Registry::new();

        let result = registry.get(&ParticipantId::from("nobody"));
        assert!(matches!(result, Err(ParticipantNotFound { .. })));
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let registry = Registry::new();
        let participant_id = ParticipantId::from("alice");

        assert!(registry.remove(&participant_id).is_none());

        registry.add(participant_id.clone()).unwrap();
        assert!(registry.remove(&participant_id).is_some());
        assert!(registry.remove(&participant_id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_generation_only_removes_matching_session() {
        let registry = Registry::new();
        let participant_id = ParticipantId::from("alice");

        let stale = registry.add(participant_id.clone()).unwrap();
        registry.remove(&participant_id).unwrap();
        let current = registry.add(participant_id.clone()).unwrap();

        assert!(
            registry
                .remove_generation(&participant_id, stale.generation())
                .is_none()
        );
        assert!(registry.contains(&participant_id));

        assert!(
            registry
                .remove_generation(&participant_id, current.generation())
                .is_some()
        );
        assert!(!registry.contains(&participant_id));
    }

    #[test]
    fn test_rejoin_after_remove() {
        let registry = Registry::new();
        let participant_id = ParticipantId::from("alice");

        registry.add(participant_id.clone()).unwrap();
        registry.remove(&participant_id).unwrap();

        assert!(registry.add(participant_id).is_ok());
    }

    #[test]
    fn test_concurrent_adds_admit_exactly_one() {
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.add(ParticipantId::from("alice")).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|admitted| *admitted)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }
}
