//! The producer-facing scheduler API.

use crate::config::SchedulerConfig;
use crate::dispatch::{drain_queue, invoke_completion, run_dispatch_loop};
use crate::error::SchedulerError;
use crate::queue::QueueEntry;
use crate::state::SchedulerState;
use crate::stats::StatsSnapshot;
use modalmux_core::{
    CompletionHandler, TaskClass, TaskId, TaskPayload, TaskPriority, TaskRecord, TaskStatus,
    Worker,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// In-process scheduler for LM, TTS and image-generation work.
///
/// Construct with [`Scheduler::new`], register workers, call
/// [`Scheduler::start`], then submit. Submissions are accepted from
/// construction until [`Scheduler::shutdown`]; tasks submitted before
/// `start` wait in their queues until the dispatch loops come up.
pub struct Scheduler {
    state: Arc<SchedulerState>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler with the given resolved configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            state: SchedulerState::new(config),
            loops: Mutex::new(Vec::new()),
        }
    }

    /// Register a worker. Fails if a worker with the same id already
    /// exists. Workers may be registered before or after `start`.
    pub async fn register_worker(&self, worker: Arc<dyn Worker>) -> Result<(), SchedulerError> {
        let mut registry = self.state.registry.lock().await;
        registry.register(worker)
    }

    /// Number of registered workers.
    pub async fn worker_count(&self) -> usize {
        self.state.registry.lock().await.len()
    }

    /// Spawn one dispatch loop per class. Idempotent; a no-op after
    /// shutdown has begun.
    pub async fn start(&self) {
        if self.state.shutting_down() {
            warn!("start called after shutdown; ignoring");
            return;
        }
        let mut loops = self.loops.lock().await;
        if !loops.is_empty() {
            return;
        }
        for class in TaskClass::ALL {
            loops.push(tokio::spawn(run_dispatch_loop(class, self.state.clone())));
        }
        info!("scheduler started");
    }

    /// Submit a task.
    ///
    /// The payload must validate and must belong to `class` (the tagged
    /// payload makes an unknown class or priority unrepresentable, so
    /// `InvalidArgument` covers payload problems and class mismatches).
    /// The optional completion handler fires exactly once, on a dispatch
    /// loop context, after the task reaches a terminal status.
    pub async fn submit(
        &self,
        class: TaskClass,
        priority: TaskPriority,
        payload: TaskPayload,
        completion: Option<CompletionHandler>,
    ) -> Result<TaskId, SchedulerError> {
        if !self.state.accepting.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutdownInProgress);
        }
        payload
            .validate()
            .map_err(|e| SchedulerError::InvalidArgument(e.to_string()))?;
        if payload.class() != class {
            return Err(SchedulerError::InvalidArgument(format!(
                "payload class {} does not match submitted class {}",
                payload.class(),
                class
            )));
        }

        let lane = self.state.lane(class);
        let mut queue = lane.queue.lock().await;
        // Re-check under the queue lock: once shutdown flips `accepting`,
        // anything we push before releasing the lock is still seen by the
        // drain, and anything after this check is rejected.
        if !self.state.accepting.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutdownInProgress);
        }

        let id = self.state.allocate_id();
        let record = TaskRecord::new(id, priority, payload, completion);
        {
            let mut index = self.state.index.lock().await;
            index.insert(id, record);
        }
        queue.push(QueueEntry { priority, id });
        self.state.stats.class(class).on_submitted();
        drop(queue);

        lane.wake.notify_one();
        debug!(task = %id, %class, %priority, "task submitted");
        Ok(id)
    }

    /// Cancel a queued task.
    ///
    /// Queued tasks transition to Cancelled, fire their completion handler
    /// and are purged; their queue entry is discarded when the dispatch
    /// loop next encounters it. Running tasks are never interrupted
    /// (`CancelTooLate`).
    pub async fn cancel(&self, id: TaskId) -> Result<(), SchedulerError> {
        let finished = {
            let mut index = self.state.index.lock().await;
            match index.get(&id).map(|record| record.status) {
                None => return Err(SchedulerError::TaskNotFound(id)),
                Some(TaskStatus::Queued) => {}
                Some(TaskStatus::Running) => return Err(SchedulerError::CancelTooLate(id)),
                Some(_) => return Err(SchedulerError::AlreadyFinished(id)),
            }
            let Some(mut record) = index.remove(&id) else {
                return Err(SchedulerError::TaskNotFound(id));
            };
            if let Err(e) = record.cancel() {
                error!(task = %id, error = %e, "cancel found record in invalid state");
                return Err(SchedulerError::TaskNotFound(id));
            }
            self.state.stats.class(record.class).on_cancelled();
            (record.outcome(), record.take_completion())
        };
        let (outcome, handler) = finished;
        invoke_completion(&self.state, handler, outcome);
        info!(task = %id, "task cancelled");
        Ok(())
    }

    /// Current status of a task, or None once the record has been purged.
    pub async fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.state.index.lock().await.get(&id).map(|r| r.status)
    }

    /// Most recently reported progress fraction, or None once the record
    /// has been purged. Meaningful for Image tasks.
    pub async fn progress(&self, id: TaskId) -> Option<f32> {
        self.state
            .index
            .lock()
            .await
            .get(&id)
            .map(|r| r.progress.fraction())
    }

    /// One-pass snapshot of the scheduler counters.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.state.stats.snapshot()
    }

    /// Stop accepting work, drain the queues and wait for the dispatch
    /// loops to finish.
    ///
    /// Every queued task is cancelled (its handler fires with a Cancelled
    /// outcome); running tasks are allowed to finish. With `grace: None`
    /// shutdown waits indefinitely; with a deadline, shutdown returns once
    /// it expires and suppresses completion handlers of any stragglers.
    pub async fn shutdown(&self, grace: Option<Duration>) {
        self.state.accepting.store(false, Ordering::Release);
        let _ = self.state.shutdown_tx.send(true);
        info!("scheduler shutting down");

        let handles: Vec<JoinHandle<()>> = {
            let mut loops = self.loops.lock().await;
            loops.drain(..).collect()
        };

        if handles.is_empty() {
            // Never started (or second shutdown): there are no loops to
            // drain the queues, so drain them here.
            for class in TaskClass::ALL {
                drain_queue(&self.state, class).await;
            }
            info!("scheduler stopped");
            return;
        }

        let join_all = async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "dispatch loop aborted");
                }
            }
        };
        match grace {
            None => join_all.await,
            Some(deadline) => {
                if tokio::time::timeout(deadline, join_all).await.is_err() {
                    self.state.handlers_enabled.store(false, Ordering::Release);
                    warn!("grace deadline expired; suppressing straggler completion handlers");
                }
            }
        }
        info!("scheduler stopped");
    }
}
