//! Healing state table
//!
//! `Execute -> Classify -> Patch -> Execute`, ending in `Success` or
//! `Exhausted`.

use crate::error::HealError;
use serde::{Deserialize, Serialize};

/// Healing loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealState {
    /// Run the current code
    Execute,
    /// Categorize the failure
    Classify,
    /// Ask the model for replacement code
    Patch,
    /// Last execution passed (terminal)
    Success,
    /// Retry cap reached or patching failed (terminal)
    Exhausted,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: HealState) -> &'static [HealState] {
    match from {
        HealState::Execute => &[HealState::Success, HealState::Classify],
        HealState::Classify => &[HealState::Patch, HealState::Exhausted],
        HealState::Patch => &[HealState::Execute, HealState::Exhausted],
        HealState::Success | HealState::Exhausted => &[],
    }
}

/// Validate a healing hop
///
/// # Errors
/// `HealError::InvalidTransition` if the table forbids it.
pub fn validate_transition(from: HealState, to: HealState) -> Result<(), HealError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(HealError::InvalidTransition { from, to })
    }
}

/// Tracks the current state, rejecting illegal hops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealMachine {
    state: HealState,
}

impl Default for HealMachine {
    fn default() -> Self {
        Self {
            state: HealState::Execute,
        }
    }
}

impl HealMachine {
    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> HealState {
        self.state
    }

    /// Move to `to`
    ///
    /// # Errors
    /// `HealError::InvalidTransition` if the table forbids it.
    pub fn advance(&mut self, to: HealState) -> Result<(), HealError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}
