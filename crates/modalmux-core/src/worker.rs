//! The contract a worker must satisfy to be registered with the scheduler.

use crate::class::TaskClass;
use crate::ids::WorkerId;
use crate::payload::{TaskOutput, TaskPayload};
use crate::task::Progress;
use async_trait::async_trait;
use thiserror::Error;

/// Errors a worker can surface from [`Worker::execute`].
///
/// The scheduler never retries; a worker error moves the task to Failed
/// with the error's display text.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The engine reported a failure while processing the request.
    #[error("{0}")]
    Execution(String),

    /// The worker cannot serve requests right now (model not loaded,
    /// device lost).
    #[error("worker not ready: {0}")]
    NotReady(String),
}

/// An opaque executor for one or more task classes.
///
/// `execute` is invoked on a dispatch-loop context and may take arbitrarily
/// long; the per-class loops guarantee a slow worker only ever stalls its
/// own class. Implementations must not retain the payload or the progress
/// handle beyond the call.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable identifier; registration rejects duplicates.
    fn id(&self) -> WorkerId;

    /// The classes this worker can execute.
    fn capabilities(&self) -> Vec<TaskClass>;

    /// Execute one request. The progress handle is scoped to this task;
    /// image workers report through it, others may ignore it.
    async fn execute(
        &self,
        payload: TaskPayload,
        progress: Progress,
    ) -> Result<TaskOutput, WorkerError>;
}
