//! The task record and its lifecycle helpers.

use crate::class::{TaskClass, TaskPriority};
use crate::error::CoreError;
use crate::ids::TaskId;
use crate::payload::{TaskOutput, TaskPayload};
use crate::status::TaskStatus;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Callback invoked exactly once when a task reaches a terminal status.
///
/// Handlers run on the dispatcher context with no scheduler lock held, so a
/// handler may re-submit work.
pub type CompletionHandler = Box<dyn FnOnce(TaskOutcome) + Send + 'static>;

/// Terminal snapshot of a task, handed to its completion handler.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Id of the finished task.
    pub id: TaskId,

    /// Terminal status: Completed, Failed or Cancelled.
    pub status: TaskStatus,

    /// Worker output; present iff Completed.
    pub result: Option<TaskOutput>,

    /// Worker error text; present iff Failed.
    pub error: Option<String>,
}

/// Thread-safe progress cell shared between a task record and the worker
/// executing it.
///
/// Fractions are clamped to [0, 1]. Only image workers report progress;
/// for other classes the cell stays at zero. Reporting is lock-free, so a
/// worker may call it from any thread at any rate.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    cell: Arc<AtomicU32>,
}

impl Progress {
    /// Record the fraction of work done so far.
    pub fn report(&self, fraction: f32) {
        let clamped = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.cell.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Read the most recently reported fraction.
    pub fn fraction(&self) -> f32 {
        f32::from_bits(self.cell.load(Ordering::Relaxed))
    }
}

/// A task owned by the scheduler's index map.
///
/// The record is the single owner of a task's state; everything else refers
/// to tasks by id. The payload is carried until the task is claimed for
/// dispatch, and the completion handler until a terminal status is
/// installed.
pub struct TaskRecord {
    /// Unique, monotonic task id.
    pub id: TaskId,

    /// Class, fixed at submission.
    pub class: TaskClass,

    /// Priority, fixed at submission.
    pub priority: TaskPriority,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Progress cell; meaningful for Image tasks.
    pub progress: Progress,

    /// Worker output; set iff Completed.
    pub result: Option<TaskOutput>,

    /// Worker error text; set iff Failed.
    pub error: Option<String>,

    /// When the task was accepted.
    pub submitted_at: DateTime<Utc>,

    /// When the task was claimed by a dispatch loop.
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,

    payload: Option<TaskPayload>,
    completion: Option<CompletionHandler>,
}

impl TaskRecord {
    /// Create a Queued record for a validated payload.
    pub fn new(
        id: TaskId,
        priority: TaskPriority,
        payload: TaskPayload,
        completion: Option<CompletionHandler>,
    ) -> Self {
        Self {
            id,
            class: payload.class(),
            priority,
            status: TaskStatus::Queued,
            progress: Progress::default(),
            result: None,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            payload: Some(payload),
            completion,
        }
    }

    /// Move the record along the lifecycle DAG, stamping timestamps.
    ///
    /// Fails with [`CoreError::InvalidTransition`] on any edge not in the
    /// DAG; callers are expected to treat that as a bug, not recover.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), CoreError> {
        if !self.status.can_transition(to) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        match to {
            TaskStatus::Running => self.started_at = Some(Utc::now()),
            _ if to.is_terminal() => self.finished_at = Some(Utc::now()),
            _ => {}
        }
        self.status = to;
        Ok(())
    }

    /// Claim the task for dispatch: Queued -> Running, handing the payload
    /// to the caller.
    pub fn start(&mut self) -> Result<TaskPayload, CoreError> {
        // A Queued record always carries its payload; `start` is the only
        // place that takes it.
        let payload = match self.payload.take() {
            Some(payload) => payload,
            None => {
                return Err(CoreError::InvalidTransition {
                    from: self.status,
                    to: TaskStatus::Running,
                })
            }
        };
        if let Err(e) = self.transition(TaskStatus::Running) {
            self.payload = Some(payload);
            return Err(e);
        }
        Ok(payload)
    }

    /// Running -> Completed with the worker's output.
    pub fn complete(&mut self, output: TaskOutput) -> Result<(), CoreError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(output);
        Ok(())
    }

    /// Running -> Failed with the worker's error text.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Queued -> Cancelled.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        self.transition(TaskStatus::Cancelled)
    }

    /// Take the completion handler; returns None after the first call.
    pub fn take_completion(&mut self) -> Option<CompletionHandler> {
        self.completion.take()
    }

    /// Snapshot for the completion handler.
    pub fn outcome(&self) -> TaskOutcome {
        TaskOutcome {
            id: self.id,
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("submitted_at", &self.submitted_at)
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::LmRequest;

    fn record() -> TaskRecord {
        TaskRecord::new(
            TaskId::new(1),
            TaskPriority::Medium,
            TaskPayload::Lm(LmRequest::new("hello")),
            None,
        )
    }

    #[test]
    fn test_happy_path_stamps_timestamps() {
        let mut rec = record();
        assert_eq!(rec.status, TaskStatus::Queued);
        assert!(rec.started_at.is_none());

        let payload = rec.start().unwrap();
        assert_eq!(payload.class(), TaskClass::Lm);
        assert_eq!(rec.status, TaskStatus::Running);
        assert!(rec.started_at.is_some());

        rec.complete(TaskOutput::Lm(crate::payload::LmResponse {
            text: "HELLO".into(),
            generated_tokens: 1,
        }))
        .unwrap();
        assert_eq!(rec.status, TaskStatus::Completed);
        assert!(rec.finished_at.is_some());
        assert!(rec.result.is_some());
    }

    #[test]
    fn test_cancel_only_while_queued() {
        let mut rec = record();
        rec.start().unwrap();
        assert!(rec.cancel().is_err());

        let mut rec = record();
        assert!(rec.cancel().is_ok());
        assert_eq!(rec.status, TaskStatus::Cancelled);
        assert!(rec.finished_at.is_some());
    }

    #[test]
    fn test_terminal_is_final() {
        let mut rec = record();
        rec.start().unwrap();
        rec.fail("oom").unwrap();
        assert!(rec.complete(TaskOutput::Lm(crate::payload::LmResponse {
            text: String::new(),
            generated_tokens: 0,
        }))
        .is_err());
        assert_eq!(rec.error.as_deref(), Some("oom"));
    }

    #[test]
    fn test_completion_taken_once() {
        let mut rec = TaskRecord::new(
            TaskId::new(2),
            TaskPriority::Low,
            TaskPayload::Lm(LmRequest::new("x")),
            Some(Box::new(|_| {})),
        );
        assert!(rec.take_completion().is_some());
        assert!(rec.take_completion().is_none());
    }

    #[test]
    fn test_progress_clamps() {
        let progress = Progress::default();
        progress.report(1.5);
        assert_eq!(progress.fraction(), 1.0);
        progress.report(-0.2);
        assert_eq!(progress.fraction(), 0.0);
        progress.report(0.25);
        assert_eq!(progress.fraction(), 0.25);
    }
}
