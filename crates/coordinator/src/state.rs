//! Coordination state machine.

use serde::{Deserialize, Serialize};

/// The state of one order coordination.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CoordinationState {
    /// No step has run yet.
    #[default]
    NotStarted,

    /// Steps are being executed.
    Running,

    /// A step failed and reservations are being released.
    Compensating,

    /// The order was placed (terminal state).
    Completed,

    /// The order was aborted (terminal state).
    Failed,
}

impl CoordinationState {
    /// Returns true if the coordination can begin running.
    pub fn can_run(&self) -> bool {
        matches!(self, CoordinationState::NotStarted)
    }

    /// Returns true if the coordination can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, CoordinationState::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CoordinationState::Completed | CoordinationState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationState::NotStarted => "NotStarted",
            CoordinationState::Running => "Running",
            CoordinationState::Compensating => "Compensating",
            CoordinationState::Completed => "Completed",
            CoordinationState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CoordinationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(CoordinationState::default(), CoordinationState::NotStarted);
    }

    #[test]
    fn test_transitions() {
        assert!(CoordinationState::NotStarted.can_run());
        assert!(!CoordinationState::Running.can_run());
        assert!(CoordinationState::Running.can_compensate());
        assert!(!CoordinationState::Compensating.can_compensate());
        assert!(!CoordinationState::Completed.can_compensate());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CoordinationState::NotStarted.is_terminal());
        assert!(!CoordinationState::Running.is_terminal());
        assert!(!CoordinationState::Compensating.is_terminal());
        assert!(CoordinationState::Completed.is_terminal());
        assert!(CoordinationState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(CoordinationState::Compensating.to_string(), "Compensating");
        assert_eq!(CoordinationState::Failed.to_string(), "Failed");
    }
}
