//! Task lifecycle statuses and the legal transitions between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a task in the scheduler.
///
/// Transitions follow a fixed DAG:
/// Queued -> Running -> {Completed, Failed}, and Queued -> Cancelled.
/// Running tasks cannot be cancelled; terminal statuses are final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted and waiting in its class queue.
    #[default]
    Queued,
    /// Claimed by a dispatch loop and executing on a worker.
    Running,
    /// Worker returned a result.
    Completed,
    /// Worker returned an error (or panicked).
    Failed,
    /// Cancelled while still queued, or drained at shutdown.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if `self -> to` is a legal transition.
    pub fn can_transition(self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Queued, TaskStatus::Running)
                | (TaskStatus::Queued, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
