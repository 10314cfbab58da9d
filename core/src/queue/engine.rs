//! The task queue engine.
//!
//! Single cooperative scheduling loop: exactly one tool invocation is in
//! flight at any instant. `add`, `pause` and `clear` may be called from
//! other tasks; the loop observes them at the top of each cycle, which is
//! why pause takes effect after the current task, never mid-task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::error::QueueError;
use crate::providers::CheckpointStore;
use crate::tools::ToolExecutor;

use super::checkpoint::QueueCheckpoint;
use super::scheduler::{self, Selection};
use super::state::{QueueSnapshot, QueueState, QueueStatus};
use super::task::Task;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Priority-and-dependency-aware work queue over a tool executor.
///
/// Cheap to clone; all clones share the same state. Constructed explicitly
/// and injected where needed, so tests can run independent queues in
/// parallel.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    state: RwLock<QueueState>,
    event_tx: broadcast::Sender<QueueSnapshot>,
    executor: Arc<dyn ToolExecutor>,
    store: Option<Arc<dyn CheckpointStore>>,
    pause_requested: AtomicBool,
    /// Loop liveness, tracked apart from the externally visible status:
    /// `pause()` flips status to `Paused` while the loop is still finishing
    /// its task, and a `start()` in that window must not begin a second loop.
    loop_active: AtomicBool,
}

impl TaskQueue {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self::build(executor, None)
    }

    /// Queue that checkpoints itself to `store` after every terminal task,
    /// pause and clear.
    pub fn with_store(executor: Arc<dyn ToolExecutor>, store: Arc<dyn CheckpointStore>) -> Self {
        Self::build(executor, Some(store))
    }

    fn build(executor: Arc<dyn ToolExecutor>, store: Option<Arc<dyn CheckpointStore>>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(QueueInner {
                state: RwLock::new(QueueState::default()),
                event_tx,
                executor,
                store,
                pause_requested: AtomicBool::new(false),
                loop_active: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to full state snapshots, one per transition. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueSnapshot> {
        self.inner.event_tx.subscribe()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.inner.state.read().await.clone()
    }

    pub async fn status(&self) -> QueueStatus {
        self.inner.state.read().await.status
    }

    /// Enqueue one task. Legal while the queue is running; the loop picks
    /// new work up on its next cycle.
    pub async fn add(&self, task: Task) -> Result<String, QueueError> {
        let id = task.id.clone();
        {
            let mut state = self.inner.state.write().await;
            let taken = state.queue.iter().chain(state.history.iter());
            if taken.chain(state.current_task.iter()).any(|t| t.id == id) {
                return Err(QueueError::DuplicateTaskId(id));
            }
            state.queue.push(task);
        }
        self.checkpoint().await;
        self.notify().await;
        Ok(id)
    }

    pub async fn add_all(&self, tasks: Vec<Task>) -> Result<Vec<String>, QueueError> {
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(self.add(task).await?);
        }
        Ok(ids)
    }

    /// Request a cooperative stop. The in-flight task (if any) runs to its
    /// terminal status first.
    pub async fn pause(&self) {
        self.inner.pause_requested.store(true, Ordering::SeqCst);
        {
            let mut state = self.inner.state.write().await;
            state.status = QueueStatus::Paused;
        }
        self.checkpoint().await;
        self.notify().await;
    }

    /// Discard pending work. History is retained for the session: it stays
    /// the dependency ledger and the record of what already ran. An in-flight
    /// task cannot be aborted; the loop settles to idle once it finishes.
    pub async fn clear(&self) {
        {
            let mut state = self.inner.state.write().await;
            state.queue.clear();
            if state.current_task.is_none() {
                state.status = QueueStatus::Idle;
            }
        }
        self.checkpoint().await;
        self.notify().await;
    }

    /// Replace the queue state with a restored checkpoint. Only sensible on
    /// an idle queue.
    pub async fn restore(&self, checkpoint: QueueCheckpoint) {
        {
            let mut state = self.inner.state.write().await;
            *state = checkpoint.restore();
        }
        self.notify().await;
    }

    /// Drive the scheduling loop until the queue drains (`Idle`) or halts
    /// (`Paused`). Returns the final snapshot. No-op if a loop is already
    /// active — including the window where a pause was requested but the
    /// in-flight task has not finished yet.
    pub async fn start(&self) -> QueueSnapshot {
        if self
            .inner
            .loop_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("start() ignored: scheduling loop already active");
            return self.snapshot().await;
        }
        self.inner.pause_requested.store(false, Ordering::SeqCst);
        {
            let mut state = self.inner.state.write().await;
            state.status = QueueStatus::Running;
        }
        self.notify().await;

        loop {
            if self.inner.pause_requested.load(Ordering::SeqCst) {
                let mut state = self.inner.state.write().await;
                state.status = QueueStatus::Paused;
                drop(state);
                self.checkpoint().await;
                self.notify().await;
                break;
            }

            let selected = {
                let mut state = self.inner.state.write().await;
                match scheduler::select_next(&state) {
                    Selection::Empty => None,
                    Selection::Deadlock { blocked_on } => {
                        let err = QueueError::Deadlock {
                            pending: state.queue.len(),
                            blocked_on: blocked_on.join(", "),
                        };
                        tracing::warn!("scheduling halted: {err}");
                        state.status = QueueStatus::Paused;
                        drop(state);
                        self.checkpoint().await;
                        self.notify().await;
                        self.inner.loop_active.store(false, Ordering::SeqCst);
                        return self.snapshot().await;
                    }
                    Selection::Ready(i) => {
                        let mut task = state.queue.remove(i);
                        task.mark_running();
                        state.current_task = Some(task.clone());
                        Some(task)
                    }
                }
            };

            let Some(mut task) = selected else {
                let mut state = self.inner.state.write().await;
                state.status = QueueStatus::Idle;
                drop(state);
                self.notify().await;
                break;
            };
            self.notify().await;

            tracing::info!(task_id = %task.id, tool = %task.invocation.tool, "executing task");
            let outcome = self
                .inner
                .executor
                .invoke(&task.invocation.tool, &task.invocation.params)
                .await;

            let failed = outcome.is_err();
            {
                let mut state = self.inner.state.write().await;
                match outcome {
                    Ok(result) => task.mark_completed(result),
                    Err(err) => {
                        tracing::warn!(task_id = %task.id, "task failed: {err}");
                        task.mark_failed(err.to_string());
                    }
                }
                state.current_task = None;
                state.history.push(task);
                if failed {
                    // Fail-fast: no automatic continuation past a failed
                    // step without operator or self-correction intervention.
                    state.status = QueueStatus::Paused;
                }
            }
            self.checkpoint().await;
            self.notify().await;

            if failed {
                break;
            }
        }

        self.inner.loop_active.store(false, Ordering::SeqCst);
        self.snapshot().await
    }

    async fn checkpoint(&self) {
        let Some(store) = self.inner.store.as_ref() else {
            return;
        };
        let snapshot = self.inner.state.read().await.clone();
        let checkpoint = QueueCheckpoint::capture(&snapshot);
        if let Err(err) = store.save(&checkpoint).await {
            tracing::warn!("queue checkpoint failed: {err}");
        }
    }

    async fn notify(&self) {
        let snapshot = self.inner.state.read().await.clone();
        let _ = self.inner.event_tx.send(snapshot);
    }
}
