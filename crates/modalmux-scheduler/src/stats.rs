//! Atomic counters consumed by monitoring.

use modalmux_core::TaskClass;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one task class.
#[derive(Debug, Default)]
pub(crate) struct ClassCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    queued: AtomicU64,
    running: AtomicU64,
    service_time_ms: AtomicU64,
}

impl ClassCounters {
    pub fn on_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_dispatched(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_completed(&self, service_ms: u64) {
        self.running.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.service_time_ms.fetch_add(service_ms, Ordering::Relaxed);
    }

    pub fn on_failed(&self, service_ms: u64) {
        self.running.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.service_time_ms.fetch_add(service_ms, Ordering::Relaxed);
    }

    /// A task cancelled while still queued (explicitly or by the shutdown
    /// drain).
    pub fn on_cancelled(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ClassStats {
        ClassStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            service_time_ms: self.service_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// All scheduler counters.
#[derive(Debug, Default)]
pub(crate) struct SchedulerStats {
    classes: [ClassCounters; 3],
    handler_errors: AtomicU64,
}

impl SchedulerStats {
    pub fn class(&self, class: TaskClass) -> &ClassCounters {
        &self.classes[class.lane()]
    }

    /// A completion handler panicked; the panic was swallowed.
    pub fn on_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// One-pass relaxed read of every counter. Counters are updated
    /// independently, so a snapshot taken mid-dispatch may be slightly
    /// skewed; consumers must tolerate that.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lm: self.class(TaskClass::Lm).snapshot(),
            tts: self.class(TaskClass::Tts).snapshot(),
            image: self.class(TaskClass::Image).snapshot(),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    /// Tasks accepted since startup.
    pub submitted: u64,

    /// Tasks that completed successfully.
    pub completed: u64,

    /// Tasks that failed (worker error or panic).
    pub failed: u64,

    /// Tasks cancelled while queued.
    pub cancelled: u64,

    /// Tasks currently waiting in the class queue.
    pub queued: u64,

    /// Tasks currently executing.
    pub running: u64,

    /// Total wall-clock service time of finished tasks, in milliseconds.
    pub service_time_ms: u64,
}

/// Point-in-time counter values for the whole scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub lm: ClassStats,
    pub tts: ClassStats,
    pub image: ClassStats,

    /// Completion handlers that panicked and were swallowed.
    pub handler_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_counting() {
        let stats = SchedulerStats::default();
        let lm = stats.class(TaskClass::Lm);

        lm.on_submitted();
        lm.on_submitted();
        lm.on_dispatched();
        lm.on_completed(40);

        let snap = stats.snapshot();
        assert_eq!(snap.lm.submitted, 2);
        assert_eq!(snap.lm.completed, 1);
        assert_eq!(snap.lm.queued, 1);
        assert_eq!(snap.lm.running, 0);
        assert_eq!(snap.lm.service_time_ms, 40);
        // Other classes untouched.
        assert_eq!(snap.tts, ClassStats::default());
        assert_eq!(snap.image, ClassStats::default());
    }

    #[test]
    fn test_cancel_moves_queued_to_cancelled() {
        let stats = SchedulerStats::default();
        let image = stats.class(TaskClass::Image);

        image.on_submitted();
        image.on_cancelled();

        let snap = stats.snapshot();
        assert_eq!(snap.image.queued, 0);
        assert_eq!(snap.image.cancelled, 1);
    }
}
