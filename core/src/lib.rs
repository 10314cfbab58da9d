//! Deskforge agent core.
//!
//! The task/agent execution core of the Deskforge IDE shell: a
//! priority-and-dependency-aware work queue that sequentially executes
//! planner-issued tool calls against a typed tool registry, persists its
//! state, and supports pause/resume and bounded self-correction. Providers
//! (filesystem, shell, git, knowledge library) are trait objects implemented
//! in `deskforge-plugins`.

pub mod chain;
pub mod config;
pub mod correction;
pub mod error;
pub mod providers;
pub mod queue;
pub mod tools;

pub use chain::{run_chain, ChainStep};
pub use correction::{CorrectionLoop, CorrectionOutcome, RemediationAction};
pub use error::{CliError, QueueError, ToolError};
pub use queue::{Priority, QueueCheckpoint, QueueStatus, Task, TaskQueue, TaskStatus};
pub use tools::{ToolExecutor, ToolRegistry};
