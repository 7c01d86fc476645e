//! Per-attempt allocation state machine

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};

/// Progress of one allocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationState {
    /// Submission received
    Start,
    /// Looking for a recent allocation
    CheckingEligibility,
    /// Duplicate detected and fraud alert recorded
    Blocked,
    /// Writing the allocation
    Committing,
    /// Allocation written
    Committed,
    /// Decrementing stock
    AdjustingInventory,
    /// Allocation and stock updates finished
    Done,
    /// Stopped on an error
    Failed,
}

impl AllocationState {
    /// Every state, in workflow order
    pub const ALL: [AllocationState; 8] = [
        AllocationState::Start,
        AllocationState::CheckingEligibility,
        AllocationState::Blocked,
        AllocationState::Committing,
        AllocationState::Committed,
        AllocationState::AdjustingInventory,
        AllocationState::Done,
        AllocationState::Failed,
    ];

    /// No transition leaves this state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// Validates a state transition.
pub fn validate_transition(
    from: AllocationState,
    to: AllocationState,
) -> Result<(), WorkflowError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition { from, to })
    }
}

/// `Committing -> Blocked` covers a backend that rejects the insert as a
/// duplicate after the eligibility read passed.
#[must_use]
pub fn allowed_transitions(from: AllocationState) -> &'static [AllocationState] {
    use AllocationState::*;
    match from {
        Start => &[CheckingEligibility, Failed],
        CheckingEligibility => &[Blocked, Committing, Failed],
        Committing => &[Committed, Blocked, Failed],
        Committed => &[AdjustingInventory],
        AdjustingInventory => &[Done],
        Blocked | Done | Failed => &[],
    }
}

/// Tracks the current state of one submission, logging each step
#[derive(Debug)]
pub(crate) struct Progress {
    state: AllocationState,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            state: AllocationState::Start,
        }
    }

    pub(crate) fn state(&self) -> AllocationState {
        self.state
    }

    pub(crate) fn advance(&mut self, to: AllocationState) -> Result<(), WorkflowError> {
        validate_transition(self.state, to)?;
        tracing::debug!(from = ?self.state, to = ?to, "allocation state transition");
        self.state = to;
        Ok(())
    }

    /// Move to `Failed` when the current state allows it
    pub(crate) fn fail(&mut self) {
        if validate_transition(self.state, AllocationState::Failed).is_ok() {
            self.state = AllocationState::Failed;
        }
    }
}
