use serde::{Deserialize, Serialize};

use super::task::Task;

/// Overall queue status. `Idle` whenever both the pending list and the
/// current slot are empty; `Paused` and `Error` are recoverable via a new
/// `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Error,
}

/// The queue's owned state. Mutated only by the engine; observers and the
/// checkpoint layer see cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueState {
    /// Pending tasks. Order here is enqueue order; execution order is
    /// re-derived every scheduling cycle.
    pub queue: Vec<Task>,
    /// Append-only log of terminal tasks, in true execution order. The only
    /// structure dependency checks consult.
    pub history: Vec<Task>,
    pub status: QueueStatus,
    /// The single task presently executing, if any.
    pub current_task: Option<Task>,
}

impl QueueState {
    /// True when a given dependency id is satisfied, i.e. present in history
    /// with status `completed`. A failed entry never satisfies.
    pub fn dependency_met(&self, dep_id: &str) -> bool {
        self.history
            .iter()
            .any(|t| t.id == dep_id && t.status == super::task::TaskStatus::Completed)
    }

    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.current_task.is_none()
    }
}

/// Immutable view delivered to observers on every state transition.
pub type QueueSnapshot = QueueState;
