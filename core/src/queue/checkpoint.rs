//! Queue checkpointing.
//!
//! A checkpoint is a versioned JSON snapshot of the whole queue state. The
//! format is internal: the only compatibility requirement is surviving a
//! reload by the same binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{QueueState, QueueStatus};
use super::task::TaskStatus;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCheckpoint {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: QueueState,
}

impl QueueCheckpoint {
    pub fn capture(state: &QueueState) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        }
    }

    /// Rebuild queue state from a checkpoint.
    ///
    /// No execution can still be in flight across a restart, so a persisted
    /// `running` status comes back as `paused`, and a persisted current task
    /// is demoted to the front of the pending queue so the work is not lost.
    pub fn restore(mut self) -> QueueState {
        if let Some(mut current) = self.state.current_task.take() {
            if !current.status.is_terminal() {
                current.status = TaskStatus::Pending;
                current.started_at = None;
                self.state.queue.insert(0, current);
            }
        }

        if self.state.status == QueueStatus::Running {
            self.state.status = QueueStatus::Paused;
        }

        self.state
    }
}
