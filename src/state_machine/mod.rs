pub mod negotiation;

/// The [`StateMachine`] trait provides calling semantics and indicates the upholding of invariants
/// that guarantee deterministic behavior.
///
/// # Functionality
/// State machines operate on defined inputs and outputs, grouped by the associated types
/// [`Input`](StateMachine::Input) and [`Output`](StateMachine::Output). These are most often
/// enums when there are several kinds of input/output, but can be a struct in the base case of a
/// single variant.
///
/// Method dispatch is defined by [`process_input`](StateMachine::process_input) and
/// [`poll_output`](StateMachine::poll_output), mapping input and output respectively. Keeping the
/// grouping and mapping here lets the machine itself stay focused on its transition logic.
///
/// # Invariants
/// A [`StateMachine`] must be pure: its operation does not depend on any external behavior of the
/// broader system, so the same sequence of inputs always produces the same sequence of outputs.
///
/// Implementors of this trait *must* uphold all the following invariants.
///
/// ## No Interior Mutability
/// All data is either immutable or mutable only through `&mut` access. No [`std::cell`] like
/// containers, no [`std::sync`] locks, no [`Arc`](std::sync::Arc) or [`Rc`](std::rc::Rc).
///
/// ## No IO
/// No [`std::io`], [`std::net`] or libraries providing similar access. This includes reading the
/// system clock and system entropy; time and randomness must arrive as input.
///
/// ## No Concurrency
/// No threads and no async. The container that owns the machine decides how inputs from
/// concurrent producers are serialized into it.
///
/// ## No Blocking
/// Processing an input never waits on anything.
///
/// # Side Effects
/// Logging is allowed as long as the logic of the machine never depends on its outcome.
///
/// # Containers
/// Impure work (talking to a media engine, taking locks, awaiting) belongs to the container that
/// wraps the machine. The container feeds the machine the facts it observed and acts on what the
/// machine outputs. See [`Session`](crate::session::Session) for the container wrapping
/// [`NegotiationMachine`](negotiation::NegotiationMachine).
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) by the state machine.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the first available output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
