//! Chain execution: load an ordered list of tool calls and drive the queue
//! until it drains or halts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueueError;
use crate::queue::{Priority, Task, TaskQueue};

/// One step of a planner-emitted chain. Priority and dependencies are
/// optional; a plain `{tool, params}` pair runs at normal priority with no
/// ordering constraints beyond the scheduler's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    pub tool: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl From<ChainStep> for Task {
    fn from(step: ChainStep) -> Self {
        let mut task = Task::new(step.tool, step.params)
            .with_priority(step.priority.unwrap_or_default())
            .with_dependencies(step.dependencies);
        if let Some(id) = step.id {
            task = task.with_id(id);
        }
        task
    }
}

/// Clear pending work, load the chain, run it, and return the history
/// entries this run produced. `start()` returns only at drain or pause, so
/// the returned slice is consistent.
pub async fn run_chain(queue: &TaskQueue, steps: Vec<ChainStep>) -> Result<Vec<Task>, QueueError> {
    queue.clear().await;
    let baseline = queue.snapshot().await.history.len();

    let tasks: Vec<Task> = steps.into_iter().map(Task::from).collect();
    queue.add_all(tasks).await?;

    let snapshot = queue.start().await;
    Ok(snapshot.history.into_iter().skip(baseline).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::queue::{QueueStatus, TaskStatus};
    use crate::tools::ToolExecutor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct StubExecutor;

    #[async_trait]
    impl ToolExecutor for StubExecutor {
        async fn invoke(&self, tool: &str, _params: &Value) -> Result<Value, ToolError> {
            if tool == "failTool" {
                Err(ToolError::execution(tool, "stub failure"))
            } else {
                Ok(json!({"ok": true}))
            }
        }
    }

    fn step(tool: &str) -> ChainStep {
        ChainStep {
            tool: tool.to_string(),
            params: json!({}),
            id: None,
            priority: None,
            dependencies: vec![],
        }
    }

    #[test]
    fn chain_steps_parse_with_defaults() {
        let step: ChainStep =
            serde_json::from_value(json!({"tool": "readFile", "params": {"path": "a"}})).unwrap();
        assert!(step.id.is_none());
        assert!(step.priority.is_none());
        assert!(step.dependencies.is_empty());

        let task = Task::from(step);
        assert_eq!(task.priority, Priority::Normal);
        assert!(!task.id.is_empty());
    }

    #[tokio::test]
    async fn chain_runs_in_order_and_returns_history() {
        let queue = TaskQueue::new(Arc::new(StubExecutor));
        let history = run_chain(&queue, vec![step("a"), step("b"), step("c")])
            .await
            .unwrap();

        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|t| t.status == TaskStatus::Completed));
        let tools: Vec<&str> = history.iter().map(|t| t.invocation.tool.as_str()).collect();
        assert_eq!(tools, vec!["a", "b", "c"]);
        assert_eq!(queue.status().await, QueueStatus::Idle);
    }

    #[tokio::test]
    async fn chain_halts_at_first_failure() {
        let queue = TaskQueue::new(Arc::new(StubExecutor));
        let history = run_chain(&queue, vec![step("a"), step("failTool"), step("c")])
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, TaskStatus::Failed);
        assert_eq!(queue.status().await, QueueStatus::Paused);
        assert_eq!(queue.snapshot().await.queue.len(), 1);
    }

    #[tokio::test]
    async fn chain_discards_stale_pending_but_not_history() {
        let queue = TaskQueue::new(Arc::new(StubExecutor));
        run_chain(&queue, vec![step("old")]).await.unwrap();

        // A leftover pending task from outside the chain is dropped.
        queue
            .add(Task::new("stale", json!({})).with_id("stale"))
            .await
            .unwrap();
        let history = run_chain(&queue, vec![step("new")]).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].invocation.tool, "new");
        // Session history retains the earlier run.
        assert_eq!(queue.snapshot().await.history.len(), 2);
    }
}
