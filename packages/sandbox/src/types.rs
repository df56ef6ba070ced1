// ABOUTME: Result types returned by sandbox lifecycle operations
// ABOUTME: Observed status for reconciliation, per-step remove reports, merge summaries

use warren_container::{ContainerState, ContainerSummary};
use warren_registry::{CorruptEntry, SandboxRecord};

/// Status of a sandbox as reconciliation sees it: the stored record
/// cross-checked against the live container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedStatus {
    Running,
    Stopped,
    /// The registry has a record but the runtime has no such container.
    Drifted,
}

impl ObservedStatus {
    pub fn from_state(state: ContainerState) -> Self {
        match state {
            ContainerState::Running => ObservedStatus::Running,
            ContainerState::Stopped => ObservedStatus::Stopped,
            ContainerState::Absent => ObservedStatus::Drifted,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ObservedStatus::Running => "running",
            ObservedStatus::Stopped => "stopped",
            ObservedStatus::Drifted => "drifted",
        }
    }
}

impl std::fmt::Display for ObservedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sandbox with its observed status.
#[derive(Debug, Clone)]
pub struct SandboxView {
    pub record: SandboxRecord,
    pub observed: ObservedStatus,
}

/// Everything `list` produces: reconciled sandboxes, registry entries that
/// could not be decoded, and containers carrying this project's labels
/// that no record claims (drift in the other direction).
#[derive(Debug, Default)]
pub struct ListReport {
    pub sandboxes: Vec<SandboxView>,
    pub corrupt: Vec<CorruptEntry>,
    pub orphans: Vec<ContainerSummary>,
}

/// The teardown steps `remove` walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStep {
    StopContainer,
    RemoveContainer,
    DeleteWorktree,
    DeleteRecord,
}

impl RemoveStep {
    pub fn as_str(&self) -> &str {
        match self {
            RemoveStep::StopContainer => "stop container",
            RemoveStep::RemoveContainer => "remove container",
            RemoveStep::DeleteWorktree => "delete working copy",
            RemoveStep::DeleteRecord => "delete registry entry",
        }
    }
}

/// Outcome of one remove step. `error` is set when the step failed but
/// `--force` carried on.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: RemoveStep,
    pub error: Option<String>,
}

/// Per-step outcome of a remove operation.
#[derive(Debug, Default)]
pub struct RemoveReport {
    pub steps: Vec<StepReport>,
}

impl RemoveReport {
    pub(crate) fn ok(&mut self, step: RemoveStep) {
        self.steps.push(StepReport { step, error: None });
    }

    pub(crate) fn failed(&mut self, step: RemoveStep, error: String) {
        self.steps.push(StepReport {
            step,
            error: Some(error),
        });
    }

    /// Whether every step completed without error.
    pub fn fully_clean(&self) -> bool {
        self.steps.iter().all(|s| s.error.is_none())
    }
}

/// Successful merge-back summary.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub branch: String,
    pub target: String,
}
