//! Worker registry: capability tracking, busy flags, LM-exclusive
//! reservation.

use crate::error::SchedulerError;
use modalmux_core::{TaskClass, Worker, WorkerId};
use std::sync::Arc;
use tracing::info;

/// One registered worker.
pub(crate) struct WorkerSlot {
    pub id: WorkerId,
    pub capabilities: Vec<TaskClass>,
    pub busy: bool,
    /// Reserved for LM work; skipped by other classes even when capable.
    pub lm_exclusive: bool,
    pub handle: Arc<dyn Worker>,
}

impl WorkerSlot {
    fn can_handle(&self, class: TaskClass) -> bool {
        self.capabilities.contains(&class)
    }
}

/// Registered workers in registration order.
///
/// Selection is a linear scan in registration order, so picks are
/// deterministic and tests are reproducible.
pub(crate) struct WorkerRegistry {
    slots: Vec<WorkerSlot>,
    dedicate_lm: bool,
}

impl WorkerRegistry {
    pub fn new(dedicate_lm: bool) -> Self {
        Self {
            slots: Vec::new(),
            dedicate_lm,
        }
    }

    /// Add a worker. The first LM-capable worker becomes LM-exclusive when
    /// the dedicate flag is set.
    pub fn register(&mut self, handle: Arc<dyn Worker>) -> Result<(), SchedulerError> {
        let id = handle.id();
        if self.slots.iter().any(|slot| slot.id == id) {
            return Err(SchedulerError::AlreadyRegistered(id));
        }

        let capabilities = handle.capabilities();
        let lm_exclusive = self.dedicate_lm
            && capabilities.contains(&TaskClass::Lm)
            && !self.slots.iter().any(|slot| slot.lm_exclusive);

        if lm_exclusive {
            info!(worker = %id, "worker reserved for LM dispatch");
        }
        info!(worker = %id, capabilities = ?capabilities, "worker registered");

        self.slots.push(WorkerSlot {
            id,
            capabilities,
            busy: false,
            lm_exclusive,
            handle,
        });
        Ok(())
    }

    /// Pick an idle worker for `class`, honoring the LM-exclusive rule:
    /// the reserved worker is returned only for LM dispatch.
    pub fn select_idle(&self, class: TaskClass) -> Option<usize> {
        self.slots.iter().position(|slot| {
            !slot.busy && slot.can_handle(class) && (class == TaskClass::Lm || !slot.lm_exclusive)
        })
    }

    /// Mark the slot busy. Paired with exactly one `mark_idle` around one
    /// task execution.
    pub fn mark_busy(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.busy = true;
        }
    }

    pub fn mark_idle(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.busy = false;
        }
    }

    pub fn slot(&self, index: usize) -> Option<&WorkerSlot> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
