//! Shared scheduler state.

use crate::config::SchedulerConfig;
use crate::queue::ClassQueue;
use crate::registry::WorkerRegistry;
use crate::stats::SchedulerStats;
use modalmux_core::{TaskClass, TaskId, TaskRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};

/// Queue and wake-up primitive for one class.
pub(crate) struct ClassLane {
    /// The class queue. Lock order: queue -> registry -> index.
    pub queue: Mutex<ClassQueue>,

    /// Wakes the class's dispatch loop after a push.
    pub wake: Notify,
}

impl ClassLane {
    fn new() -> Self {
        Self {
            queue: Mutex::new(ClassQueue::default()),
            wake: Notify::new(),
        }
    }
}

/// State shared between the producer API and the three dispatch loops.
///
/// Lock order is queue -> registry -> index, released in reverse; no
/// completion handler ever runs with one of these locks held.
pub(crate) struct SchedulerState {
    pub config: SchedulerConfig,

    /// Single owner of task records, keyed by id.
    pub index: Mutex<HashMap<TaskId, TaskRecord>>,

    lanes: [ClassLane; 3],

    pub registry: Mutex<WorkerRegistry>,

    pub stats: SchedulerStats,

    /// Cleared when shutdown begins; submissions are rejected after that.
    pub accepting: AtomicBool,

    /// Cleared when the shutdown grace deadline expires; straggler
    /// completions stop invoking handlers.
    pub handlers_enabled: AtomicBool,

    /// Broadcasts the shutdown signal to the dispatch loops.
    pub shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    next_id: AtomicU64,
}

impl SchedulerState {
    pub fn new(config: SchedulerConfig) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = WorkerRegistry::new(config.dedicate_lm_worker);
        Arc::new(Self {
            config,
            index: Mutex::new(HashMap::new()),
            lanes: [ClassLane::new(), ClassLane::new(), ClassLane::new()],
            registry: Mutex::new(registry),
            stats: SchedulerStats::default(),
            accepting: AtomicBool::new(true),
            handlers_enabled: AtomicBool::new(true),
            shutdown_tx,
            shutdown_rx,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn lane(&self, class: TaskClass) -> &ClassLane {
        &self.lanes[class.lane()]
    }

    /// Allocate the next task id. Called with the submitting class's queue
    /// lock held, so within a class id order equals enqueue order.
    pub fn allocate_id(&self) -> TaskId {
        TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// A receiver on the shutdown signal for a dispatch loop.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// True once shutdown has been requested.
    pub fn shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}
