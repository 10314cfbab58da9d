//! Priority-and-dependency-aware agent task queue.
//!
//! ```text
//! Vec<Task>
//!   ↓ add / add_all
//! TaskQueue { queue, history, status, current_task }
//!   ↓ start()            one cooperative loop, one task in flight
//! scheduler::select_next  priority sort + dependency scan per cycle
//!   ↓
//! ToolExecutor::invoke    success → completed, failure → failed + pause
//!   ↓
//! history (append-only)   checkpointed after every terminal task
//! ```

mod checkpoint;
mod engine;
mod scheduler;
mod state;
mod task;

pub use checkpoint::{QueueCheckpoint, CHECKPOINT_VERSION};
pub use engine::TaskQueue;
pub use scheduler::{select_next, Selection};
pub use state::{QueueSnapshot, QueueState, QueueStatus};
pub use task::{Priority, Task, TaskStatus, ToolInvocation};
