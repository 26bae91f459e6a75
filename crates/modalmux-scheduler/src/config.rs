//! Scheduler configuration.

use std::time::Duration;

/// Resolved scheduler configuration.
///
/// The core does not load configuration itself; the owner constructs this
/// from whatever config source it uses and passes it in.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Reserve the first registered LM-capable worker for LM work only.
    ///
    /// The reserved worker is skipped by TTS and image dispatch even when
    /// its capability set would allow them, bounding LM head-of-line delay
    /// to one in-flight LM task.
    pub dedicate_lm_worker: bool,

    /// How long a dispatch loop backs off before retrying when every
    /// capable worker is busy. Clamped to 100 ms by the loop.
    pub idle_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dedicate_lm_worker: true,
            idle_backoff: Duration::from_millis(20),
        }
    }
}
