//! Scan task lifecycle states
//!
//! A task moves strictly forward: `Queued -> Running -> {Completed, Failed}`.
//! A spawn failure still passes through `Running` so that no task is ever
//! observed jumping from `Queued` straight to a terminal state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a scan task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Submitted, process not started yet
    Queued,
    /// Process spawned, streams open
    Running,
    /// Process exited with status zero
    Completed,
    /// Process exited non-zero, failed to start, or orchestration failed
    Failed,
}

impl TaskState {
    /// Whether `next` is the legal successor of `self`
    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Queued, TaskState::Running)
                | (TaskState::Running, TaskState::Completed)
                | (TaskState::Running, TaskState::Failed)
        )
    }

    /// Completed or failed
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Queued or running
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Wire name of the state
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
