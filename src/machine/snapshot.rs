//! Read-only view published to the presentation layer

use std::fmt;

use crate::machine::context::WorkflowContext;
use crate::machine::state::WorkflowState;

/// Whether the workflow is still accepting events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    Active,
    /// An invocation without a failure transition rejected
    Faulted { step: String, message: String },
    Stopped,
}

/// State + context at one point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: WorkflowState,
    pub context: WorkflowContext,
    pub status: WorkflowStatus,
}

impl Snapshot {
    /// Hierarchical match, e.g. `"wallet.error"` or `"validate.amount.error"`
    pub fn matches(&self, pattern: &str) -> bool {
        self.state.matches(pattern)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.status, WorkflowStatus::Faulted { .. })
    }
}

/// One recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: WorkflowState,
    pub to: WorkflowState,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
