//! Scheduler errors.

use modalmux_core::{TaskId, WorkerId};
use thiserror::Error;

/// Errors surfaced by the scheduler API.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Submission rejected: payload failed validation or does not match
    /// the submitted class.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Submission rejected: shutdown has begun (or the scheduler never
    /// accepted work).
    #[error("scheduler is shutting down")]
    ShutdownInProgress,

    /// No record with this id exists (unknown id, or already purged).
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The task is already running; running tasks are not interrupted.
    #[error("task {0} is already running; too late to cancel")]
    CancelTooLate(TaskId),

    /// The task already reached a terminal status.
    #[error("task {0} already finished")]
    AlreadyFinished(TaskId),

    /// A worker with this id is already registered.
    #[error("worker already registered: {0}")]
    AlreadyRegistered(WorkerId),
}
