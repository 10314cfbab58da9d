use thiserror::Error;

/// Errors raised by the task queue engine itself, as opposed to failures of
/// the tools it runs (those become `failed` history entries).
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("deadlock: {pending} pending task(s) but none are ready; blocked on {blocked_on}")]
    Deadlock { pending: usize, blocked_on: String },

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),
}
