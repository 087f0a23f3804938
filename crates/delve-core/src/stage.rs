//! Pipeline stage table
//!
//! `Clarify -> WriteBrief -> Supervise -> Synthesize -> Done`, with
//! `Clarify -> Halted` when the user must answer a question first.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Deciding whether to ask a clarifying question
    Clarify,
    /// Turning the thread into a brief
    WriteBrief,
    /// Supervisor loop with worker fan-out
    Supervise,
    /// Writing the final report
    Synthesize,
    /// Waiting for a user reply (terminal)
    Halted,
    /// Report produced (terminal)
    Done,
}

impl Stage {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// Stages reachable from `from`
#[must_use]
pub fn allowed_transitions(from: Stage) -> &'static [Stage] {
    match from {
        Stage::Clarify => &[Stage::WriteBrief, Stage::Halted],
        Stage::WriteBrief => &[Stage::Supervise],
        Stage::Supervise => &[Stage::Synthesize],
        Stage::Synthesize => &[Stage::Done],
        Stage::Halted | Stage::Done => &[],
    }
}

/// Validate a stage hop
///
/// # Errors
/// `PipelineError::InvalidTransition` if the table forbids it.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        let path = [
            Stage::Clarify,
            Stage::WriteBrief,
            Stage::Supervise,
            Stage::Synthesize,
            Stage::Done,
        ];
        for hop in path.windows(2) {
            assert!(validate_transition(hop[0], hop[1]).is_ok());
        }
    }

    #[test]
    fn halted_is_terminal() {
        assert!(validate_transition(Stage::Clarify, Stage::Halted).is_ok());
        assert!(Stage::Halted.is_terminal());
        assert!(validate_transition(Stage::Halted, Stage::WriteBrief).is_err());
    }

    #[test]
    fn cannot_skip_supervision() {
        assert!(validate_transition(Stage::WriteBrief, Stage::Synthesize).is_err());
    }
}
