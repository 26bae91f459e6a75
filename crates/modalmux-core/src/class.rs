//! Task classes and priorities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three classes of inference work the scheduler multiplexes.
///
/// Each class has its own queue and its own dispatch loop; a worker serves a
/// class only if the class is in its capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskClass {
    /// Language-model inference. Latency-critical.
    Lm,
    /// Speech synthesis. CPU-bound, sub-second.
    Tts,
    /// Image generation. Long-running, queue-tolerant.
    Image,
}

impl TaskClass {
    /// All classes, in dispatch-lane order.
    pub const ALL: [TaskClass; 3] = [TaskClass::Lm, TaskClass::Tts, TaskClass::Image];

    /// Dense index for per-class arrays (lanes, counters).
    pub fn lane(self) -> usize {
        match self {
            TaskClass::Lm => 0,
            TaskClass::Tts => 1,
            TaskClass::Image => 2,
        }
    }
}

impl fmt::Display for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskClass::Lm => "lm",
            TaskClass::Tts => "tts",
            TaskClass::Image => "image",
        };
        write!(f, "{s}")
    }
}

/// Scheduling priority within a class queue.
///
/// Higher priorities dispatch first; within a priority, submission order
/// wins. Priorities never reorder work across classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    /// Numeric rank used by the queue ordering; higher dispatches first.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 2,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 0,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_order() {
        assert!(TaskPriority::High.rank() > TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() > TaskPriority::Low.rank());
    }

    #[test]
    fn test_lane_indices_are_dense() {
        let lanes: Vec<usize> = TaskClass::ALL.iter().map(|c| c.lane()).collect();
        assert_eq!(lanes, vec![0, 1, 2]);
    }
}
