//! Per-class dispatch loops.
//!
//! One long-lived loop per class pulls from that class's queue, binds the
//! task to an idle capable worker and drives it to a terminal status. The
//! loops share the worker registry and the task index but never each
//! other's queues, so a class with slow work (image generation) cannot
//! stall the others.

use crate::state::SchedulerState;
use futures::FutureExt;
use modalmux_core::{
    CompletionHandler, Progress, TaskClass, TaskId, TaskOutcome, TaskPayload, TaskStatus, Worker,
    WorkerId,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Hard cap on the busy-worker retry backoff.
const MAX_IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// A task claimed for execution: popped from its queue, transitioned to
/// Running, with its worker marked busy.
struct Claimed {
    id: TaskId,
    payload: TaskPayload,
    progress: Progress,
    worker_index: usize,
    worker_id: WorkerId,
    worker: Arc<dyn Worker>,
}

enum Claim {
    /// A task was claimed and is ready to execute.
    Task(Box<Claimed>),
    /// The queue is empty; wait for a submission.
    Empty,
    /// Work is queued but every capable worker is busy; back off. This is
    /// the backpressure path: image work accumulates here without touching
    /// the other classes.
    NoWorker,
}

/// Run the dispatch loop for one class until shutdown, then drain the
/// class queue.
pub(crate) async fn run_dispatch_loop(class: TaskClass, state: Arc<SchedulerState>) {
    let mut shutdown = state.shutdown_signal();
    let backoff = state.config.idle_backoff.min(MAX_IDLE_BACKOFF);
    info!(%class, "dispatch loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        match claim_next(&state, class).await {
            Claim::Task(claimed) => execute_claimed(&state, class, *claimed).await,
            Claim::Empty => {
                let lane = state.lane(class);
                tokio::select! {
                    _ = lane.wake.notified() => {}
                    _ = shutdown.changed() => {}
                }
            }
            Claim::NoWorker => {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }

    drain_queue(&state, class).await;
    info!(%class, "dispatch loop stopped");
}

/// Try to claim the highest-priority live task in the class queue.
///
/// Holds the queue lock throughout so the claim (pop + Running transition
/// + busy mark) is atomic with respect to submissions and the shutdown
/// drain. Lock order: queue -> registry -> index.
async fn claim_next(state: &Arc<SchedulerState>, class: TaskClass) -> Claim {
    let lane = state.lane(class);
    let mut queue = lane.queue.lock().await;

    loop {
        let Some(head) = queue.peek().copied() else {
            return Claim::Empty;
        };

        // Cancellation purges the record but leaves the queue entry; a
        // missing record means the entry is stale and is discarded here.
        let live = state.index.lock().await.contains_key(&head.id);
        if !live {
            queue.pop();
            debug!(task = %head.id, %class, "discarded cancelled queue entry");
            continue;
        }

        let mut registry = state.registry.lock().await;
        let Some(worker_index) = registry.select_idle(class) else {
            return Claim::NoWorker;
        };
        let Some(slot) = registry.slot(worker_index) else {
            return Claim::NoWorker;
        };
        let worker = slot.handle.clone();
        let worker_id = slot.id.clone();

        let mut index = state.index.lock().await;
        let claimed = match index.get_mut(&head.id) {
            // Cancelled between the liveness check and now.
            None => None,
            Some(record) => match record.start() {
                Ok(payload) => {
                    let progress = record.progress.clone();
                    Some((payload, progress))
                }
                Err(e) => {
                    error!(task = %head.id, %class, error = %e, "discarding queue entry in invalid state");
                    None
                }
            },
        };
        drop(index);

        let Some((payload, progress)) = claimed else {
            queue.pop();
            continue;
        };

        queue.pop();
        registry.mark_busy(worker_index);
        state.stats.class(class).on_dispatched();

        return Claim::Task(Box::new(Claimed {
            id: head.id,
            payload,
            progress,
            worker_index,
            worker_id,
            worker,
        }));
    }
}

/// Execute a claimed task on its worker and install the terminal status.
async fn execute_claimed(state: &Arc<SchedulerState>, class: TaskClass, claimed: Claimed) {
    debug!(task = %claimed.id, %class, worker = %claimed.worker_id, "dispatching task");

    let started = Instant::now();
    let call = AssertUnwindSafe(claimed.worker.execute(claimed.payload, claimed.progress))
        .catch_unwind()
        .await;
    let service_ms = started.elapsed().as_millis() as u64;

    {
        let mut registry = state.registry.lock().await;
        registry.mark_idle(claimed.worker_index);
    }

    let finished = {
        let mut index = state.index.lock().await;
        let Some(record) = index.get_mut(&claimed.id) else {
            error!(task = %claimed.id, "running task vanished from index");
            return;
        };
        let install = match call {
            Ok(Ok(output)) => {
                debug!(task = %claimed.id, %class, service_ms, "task completed");
                state.stats.class(class).on_completed(service_ms);
                record.complete(output)
            }
            Ok(Err(worker_err)) => {
                warn!(task = %claimed.id, %class, worker = %claimed.worker_id, error = %worker_err, "task failed");
                state.stats.class(class).on_failed(service_ms);
                record.fail(worker_err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic);
                error!(task = %claimed.id, %class, worker = %claimed.worker_id, %message, "worker panicked");
                state.stats.class(class).on_failed(service_ms);
                record.fail(format!("worker panicked: {message}"))
            }
        };
        if let Err(e) = install {
            error!(task = %claimed.id, error = %e, "failed to install terminal status");
        }
        (record.outcome(), record.take_completion())
    };

    // The terminal status is visible before the handler runs, and the
    // handler runs with no scheduler lock held.
    let (outcome, handler) = finished;
    invoke_completion(state, handler, outcome);

    state.index.lock().await.remove(&claimed.id);
}

/// Cancel every task still queued for `class`. Runs once per loop after
/// it observes shutdown, and from `shutdown` itself when the scheduler was
/// never started.
pub(crate) async fn drain_queue(state: &Arc<SchedulerState>, class: TaskClass) {
    let entries = {
        let mut queue = state.lane(class).queue.lock().await;
        queue.drain()
    };
    if entries.is_empty() {
        return;
    }

    let mut drained = 0usize;
    for entry in entries {
        let finished = {
            let mut index = state.index.lock().await;
            match index.get(&entry.id).map(|record| record.status) {
                // Already cancelled; the entry was stale.
                None => continue,
                Some(TaskStatus::Queued) => {}
                Some(status) => {
                    error!(task = %entry.id, %status, "drain found record in invalid state");
                    continue;
                }
            }
            let Some(mut record) = index.remove(&entry.id) else {
                continue;
            };
            if let Err(e) = record.cancel() {
                error!(task = %entry.id, error = %e, "drain could not cancel record");
                continue;
            }
            state.stats.class(class).on_cancelled();
            (record.outcome(), record.take_completion())
        };
        let (outcome, handler) = finished;
        invoke_completion(state, handler, outcome);
        drained += 1;
    }
    info!(%class, drained, "cancelled queued tasks at shutdown");
}

/// Invoke a completion handler, containing any panic it raises.
///
/// Must be called with no scheduler lock held. Handlers stop firing once
/// the shutdown grace deadline has expired.
pub(crate) fn invoke_completion(
    state: &SchedulerState,
    handler: Option<CompletionHandler>,
    outcome: TaskOutcome,
) {
    let Some(handler) = handler else {
        return;
    };
    if !state.handlers_enabled.load(Ordering::Acquire) {
        return;
    }
    let id = outcome.id;
    if std::panic::catch_unwind(AssertUnwindSafe(move || handler(outcome))).is_err() {
        state.stats.on_handler_error();
        warn!(task = %id, "completion handler panicked");
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
