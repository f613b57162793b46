//! Submission state management
//!
//! Defines the contact-form submission phases and the transition table
//! between them. The table is the single place that decides whether a
//! submit may start, so the one-in-flight rule is enforced here rather
//! than by whichever button happens to be disabled.

/// Stage of the contact-form lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPhase {
    /// Form is being filled, nothing sent yet
    #[default]
    Idle,
    /// One request is in flight
    Submitting,
    /// Endpoint accepted the submission
    Submitted,
    /// Last attempt failed; a new submit is allowed
    Failed,
}

impl SubmissionPhase {
    /// Whether a request is currently in flight
    pub fn is_in_flight(self) -> bool {
        self == SubmissionPhase::Submitting
    }
}

/// Events that drive the submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEvent {
    /// User (or code) asked to send the form
    SubmitRequested,
    /// Endpoint answered with a success status
    DeliverySucceeded,
    /// Endpoint rejected the payload or could not be reached
    DeliveryFailed,
    /// Re-arm the form after a terminal outcome
    Reset,
}

/// Why an event did not change the phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A submit arrived while another one is in flight
    AlreadyInProgress,
    /// A submit arrived after the form was accepted
    AlreadySubmitted,
    /// The event has no meaning in the current phase
    NotApplicable,
}

/// Result of feeding one event to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(SubmissionPhase),
    Rejected(RejectReason),
}

impl Transition {
    /// Phase after the event, falling back to `current` when rejected
    pub fn phase_or(self, current: SubmissionPhase) -> SubmissionPhase {
        match self {
            Transition::Moved(next) => next,
            Transition::Rejected(_) => current,
        }
    }
}

/// State machine for submission phase transitions
pub struct SubmissionStateMachine;

impl SubmissionStateMachine {
    /// Processes an event against the current phase
    ///
    /// # Arguments
    /// * `current` - Phase before the event
    /// * `event` - Event to process
    ///
    /// # Returns
    /// The new phase, or the reason the event was ignored
    pub fn process_event(current: SubmissionPhase, event: SubmissionEvent) -> Transition {
        use SubmissionEvent as E;
        use SubmissionPhase as P;

        match (current, event) {
            (P::Idle | P::Failed, E::SubmitRequested) => Transition::Moved(P::Submitting),
            (P::Submitting, E::SubmitRequested) => {
                Transition::Rejected(RejectReason::AlreadyInProgress)
            }
            (P::Submitted, E::SubmitRequested) => {
                Transition::Rejected(RejectReason::AlreadySubmitted)
            }

            (P::Submitting, E::DeliverySucceeded) => Transition::Moved(P::Submitted),
            (P::Submitting, E::DeliveryFailed) => Transition::Moved(P::Failed),

            (P::Idle | P::Submitted | P::Failed, E::Reset) => Transition::Moved(P::Idle),

            // Invalid transitions - ignore event
            _ => Transition::Rejected(RejectReason::NotApplicable),
        }
    }
}
