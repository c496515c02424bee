use std::fmt;

use super::StateMachine;

/// Where a participant's offer/answer negotiation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// Registered, engine participant not requested yet.
    Created,
    /// Engine participant is being created from the client's initial offer.
    Joining,
    /// No offer outstanding in either direction.
    Stable,
    /// The engine pushed an offer and the client has not answered it yet.
    Negotiating,
    /// Terminal.
    Closed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }

    /// Whether the engine participant exists in this state.
    pub fn is_established(self) -> bool {
        matches!(self, NegotiationState::Stable | NegotiationState::Negotiating)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Created => "created",
            NegotiationState::Joining => "joining",
            NegotiationState::Stable => "stable",
            NegotiationState::Negotiating => "negotiating",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Facts fed into the [`NegotiationMachine`] by its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationInput {
    BeginJoin,
    JoinCompleted,
    JoinFailed,
    /// A client offer was applied and answered.
    RemoteOffer,
    /// The engine produced a new offer for the client.
    LocalOffer,
    /// The client's answer to an engine offer was applied.
    RemoteAnswer,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutput {
    Transitioned {
        from: NegotiationState,
        to: NegotiationState,
    },
    Rejected {
        input: NegotiationInput,
        state: NegotiationState,
    },
}

/// Indicates that an input is not valid in the current negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{input:?} is not valid while negotiation is {state}")]
pub struct InvalidTransition {
    pub input: NegotiationInput,
    pub state: NegotiationState,
}

/// Pure offer/answer state for one participant.
#[derive(Debug)]
pub struct NegotiationMachine {
    state: NegotiationState,
    pending: Option<NegotiationOutput>,
}

impl NegotiationMachine {
    pub fn new() -> Self {
        Self {
            state: NegotiationState::Created,
            pending: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Whether `input` would be accepted without applying it.
    pub fn accepts(&self, input: NegotiationInput) -> bool {
        Self::next_state(self.state, input).is_some()
    }

    /// Process `input` and return the resulting transition.
    pub fn transition(
        &mut self,
        input: NegotiationInput,
    ) -> Result<(NegotiationState, NegotiationState), InvalidTransition> {
        self.process_input(input);
        match self.poll_output() {
            Some(NegotiationOutput::Transitioned { from, to }) => Ok((from, to)),
            Some(NegotiationOutput::Rejected { input, state }) => {
                Err(InvalidTransition { input, state })
            }
            None => Err(InvalidTransition {
                input,
                state: self.state,
            }),
        }
    }

    fn next_state(state: NegotiationState, input: NegotiationInput) -> Option<NegotiationState> {
        use NegotiationInput as I;
        use NegotiationState as S;

        match (state, input) {
            (S::Created, I::BeginJoin) => Some(S::Joining),
            (S::Joining, I::JoinCompleted) => Some(S::Stable),
            (S::Joining, I::JoinFailed) => Some(S::Closed),
            (S::Stable | S::Negotiating, I::RemoteOffer) => Some(S::Stable),
            (S::Stable | S::Negotiating, I::LocalOffer) => Some(S::Negotiating),
            (S::Negotiating, I::RemoteAnswer) => Some(S::Stable),
            (S::Closed, I::Close) => None,
            (_, I::Close) => Some(S::Closed),
            _ => None,
        }
    }
}

impl Default for NegotiationMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine for NegotiationMachine {
    type Input = NegotiationInput;
    type Output = NegotiationOutput;

    fn process_input(&mut self, input: Self::Input) {
        let from = self.state;
        self.pending = Some(match Self::next_state(from, input) {
            Some(to) => {
                self.state = to;
                NegotiationOutput::Transitioned { from, to }
            }
            None => NegotiationOutput::Rejected { input, state: from },
        });
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined() -> NegotiationMachine {
        let mut machine = NegotiationMachine::new();
        machine.transition(NegotiationInput::BeginJoin).unwrap();
        machine.transition(NegotiationInput::JoinCompleted).unwrap();
        machine
    }

    #[test]
    fn test_initial_state() {
        let mut machine = NegotiationMachine::new();
        assert_eq!(machine.state(), NegotiationState::Created);
        assert!(machine.poll_output().is_none());
    }

    #[test]
    fn test_join_reaches_stable() {
        let mut machine = NegotiationMachine::new();

        machine.process_input(NegotiationInput::BeginJoin);
        assert_eq!(
            machine.poll_output(),
            Some(NegotiationOutput::Transitioned {
                from: NegotiationState::Created,
                to: NegotiationState::Joining,
            })
        );

        machine.process_input(NegotiationInput::JoinCompleted);
        assert_eq!(machine.state(), NegotiationState::Stable);

        // Output is consumed by polling
        assert!(machine.poll_output().is_some());
        assert!(machine.poll_output().is_none());
    }

    #[test]
    fn test_failed_join_is_terminal() {
        let mut machine = NegotiationMachine::new();
        machine.transition(NegotiationInput::BeginJoin).unwrap();
        machine.transition(NegotiationInput::JoinFailed).unwrap();

        assert!(machine.state().is_closed());
        assert!(!machine.accepts(NegotiationInput::BeginJoin));
        assert!(!machine.accepts(NegotiationInput::Close));
    }

    #[test]
    fn test_server_renegotiation_round_trip() {
        let mut machine = joined();

        machine.transition(NegotiationInput::LocalOffer).unwrap();
        assert_eq!(machine.state(), NegotiationState::Negotiating);

        // The engine may replace its outstanding offer
        machine.transition(NegotiationInput::LocalOffer).unwrap();
        assert_eq!(machine.state(), NegotiationState::Negotiating);

        machine.transition(NegotiationInput::RemoteAnswer).unwrap();
        assert_eq!(machine.state(), NegotiationState::Stable);
    }

    #[test]
    fn test_remote_answer_requires_outstanding_offer() {
        let mut machine = joined();

        let err = machine.transition(NegotiationInput::RemoteAnswer).unwrap_err();
        assert_eq!(err.state, NegotiationState::Stable);
        assert_eq!(err.input, NegotiationInput::RemoteAnswer);
        assert_eq!(machine.state(), NegotiationState::Stable);
    }

    #[test]
    fn test_client_offer_settles_pending_negotiation() {
        let mut machine = joined();
        machine.transition(NegotiationInput::LocalOffer).unwrap();

        machine.transition(NegotiationInput::RemoteOffer).unwrap();
        assert_eq!(machine.state(), NegotiationState::Stable);
    }

    #[test]
    fn test_nothing_but_close_before_join() {
        let mut machine = NegotiationMachine::new();

        for input in [
            NegotiationInput::JoinCompleted,
            NegotiationInput::RemoteOffer,
            NegotiationInput::LocalOffer,
            NegotiationInput::RemoteAnswer,
        ] {
            assert!(machine.transition(input).is_err(), "{input:?} accepted");
        }
        assert_eq!(machine.state(), NegotiationState::Created);

        machine.transition(NegotiationInput::Close).unwrap();
        assert!(machine.state().is_closed());
    }
}
