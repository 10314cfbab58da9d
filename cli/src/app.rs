//! Command implementations.

use std::sync::Arc;

use deskforge_core::chain::{run_chain, ChainStep};
use deskforge_core::config::AppConfig;
use deskforge_core::correction::{CorrectionLoop, CorrectionOutcome};
use deskforge_core::error::CliError;
use deskforge_core::providers::{CheckpointStore, CommandOutput, LibraryProvider};
use deskforge_core::queue::{QueueStatus, Task, TaskQueue, TaskStatus};
use deskforge_core::tools::{ToolExecutor, ToolRegistry};
use deskforge_plugins::build_registry;
use deskforge_plugins::library::{LocalLibrary, OllamaEmbedding};

/// Tool names whose failures are command failures the correction loop can
/// work on. `executeTerminalCommand` is the planner-facing alias.
const COMMAND_TOOLS: &[&str] = &["runCommand", "executeTerminalCommand"];

fn open_library(cfg: &AppConfig) -> Result<LocalLibrary, CliError> {
    let store_path = cfg
        .library
        .store_path
        .clone()
        .ok_or_else(|| CliError::Config("library store path is not set".to_string()))?;
    let embedder = Arc::new(OllamaEmbedding::new(
        cfg.library.embedding.base_url.clone(),
        cfg.library.embedding.model.clone(),
        cfg.library.embedding.dimension,
    ));
    Ok(LocalLibrary::open(store_path, embedder, cfg.library.min_score)?)
}

fn print_history(history: &[Task]) {
    for task in history {
        let mark = match task.status {
            TaskStatus::Completed => "ok  ",
            TaskStatus::Failed => "FAIL",
            _ => "?   ",
        };
        match &task.error {
            Some(err) => println!("{mark} {:<24} {}  ({err})", task.invocation.tool, task.id),
            None => println!("{mark} {:<24} {}", task.invocation.tool, task.id),
        }
    }
}

fn exit_code_for(history: &[Task], status: QueueStatus) -> i32 {
    if history.iter().any(|t| t.status == TaskStatus::Failed) {
        1
    } else if status == QueueStatus::Paused {
        // Paused without a failure means unmet dependencies.
        2
    } else {
        0
    }
}

/// Rebuild a command-shaped output from a failed history entry so the
/// correction loop can classify it. The task's error string carries the
/// matched error lines the registry folded in, `"; "`-joined.
fn failure_output(task: &Task) -> CommandOutput {
    let stderr = task.error.clone().unwrap_or_default();
    let matched_errors = stderr
        .split(['\n', ';'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    CommandOutput {
        run_id: String::new(),
        exit_code: 1,
        stdout: String::new(),
        stderr,
        matched_errors,
    }
}

/// Run the self-correction loop over a failed command task, re-running the
/// command through the registry (validator included) on each pass.
async fn correct_failed_command(
    cfg: &AppConfig,
    registry: Arc<ToolRegistry>,
    task: &Task,
) -> CorrectionOutcome {
    let mut correction = CorrectionLoop::new()
        .with_max_attempts(cfg.correction.max_attempts)
        .with_lint_fix_command(cfg.correction.lint_fix_command.clone());
    if let Ok(library) = open_library(cfg) {
        correction = correction.with_library(Arc::new(library));
    }

    let params = task.invocation.params.clone();
    let retry = move || {
        let registry = registry.clone();
        let params = params.clone();
        async move {
            match registry.invoke("runCommand", &params).await {
                Ok(payload) => Ok(serde_json::from_value(payload)?),
                Err(err) => Ok(CommandOutput {
                    run_id: String::new(),
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: err.to_string(),
                    matched_errors: vec![err.to_string()],
                }),
            }
        }
    };
    correction.correct(failure_output(task), Some(retry)).await
}

fn report_correction(outcome: CorrectionOutcome) {
    match outcome {
        CorrectionOutcome::Resolved { attempts, .. } => {
            println!("self-correction: command succeeded after {attempts} attempt(s)");
        }
        CorrectionOutcome::Escalated {
            analysis, attempts, ..
        } => {
            eprintln!("self-correction gave up after {attempts} attempt(s):\n{analysis}");
        }
        CorrectionOutcome::NotApplicable(_) => {}
    }
}

pub async fn run(cfg: &AppConfig, chain_file: &str) -> Result<i32, CliError> {
    let raw = std::fs::read_to_string(chain_file)?;
    let steps: Vec<ChainStep> =
        serde_json::from_str(&raw).map_err(|e| CliError::Chain(e.to_string()))?;
    if steps.is_empty() {
        return Err(CliError::Chain(format!("{chain_file} contains no steps")));
    }
    tracing::info!(file = %chain_file, steps = steps.len(), "running chain");

    let (registry, store) = build_registry(cfg)?;
    let registry = Arc::new(registry);
    let queue = TaskQueue::with_store(registry.clone(), store);
    let history = run_chain(&queue, steps).await?;
    let status = queue.status().await;

    print_history(&history);

    let failed_command = history.iter().find(|t| {
        t.status == TaskStatus::Failed && COMMAND_TOOLS.contains(&t.invocation.tool.as_str())
    });
    if let Some(task) = failed_command {
        let outcome = correct_failed_command(cfg, registry, task).await;
        report_correction(outcome);
    }

    Ok(exit_code_for(&history, status))
}

pub async fn resume(cfg: &AppConfig) -> Result<i32, CliError> {
    let (registry, store) = build_registry(cfg)?;
    let Some(checkpoint) = store.load().await? else {
        eprintln!("no saved checkpoint to resume from");
        return Ok(1);
    };

    let queue = TaskQueue::with_store(Arc::new(registry), store);
    queue.restore(checkpoint).await;
    let before = queue.snapshot().await.history.len();
    tracing::info!(pending = queue.snapshot().await.queue.len(), "resuming from checkpoint");

    let snapshot = queue.start().await;
    let resumed: Vec<Task> = snapshot.history.into_iter().skip(before).collect();

    print_history(&resumed);
    Ok(exit_code_for(&resumed, snapshot.status))
}

pub async fn inspect(cfg: &AppConfig) -> Result<i32, CliError> {
    let (_registry, store) = build_registry(cfg)?;
    match store.load().await? {
        Some(checkpoint) => {
            println!("{}", serde_json::to_string_pretty(&checkpoint).map_err(anyhow::Error::from)?);
            Ok(0)
        }
        None => {
            println!("no saved checkpoint");
            Ok(0)
        }
    }
}

fn effective_top_k(cfg: &AppConfig, flag: Option<usize>) -> usize {
    flag.unwrap_or(cfg.library.top_k)
}

pub async fn query(cfg: &AppConfig, question: &str, top_k: Option<usize>) -> Result<i32, CliError> {
    let library = open_library(cfg)?;
    let hits = library.query(question, effective_top_k(cfg, top_k)).await?;

    if hits.is_empty() {
        println!("no matches");
        return Ok(0);
    }
    for hit in hits {
        println!("[{:.3}] {}", hit.score, hit.source);
        for line in hit.text.lines() {
            println!("    {line}");
        }
    }
    Ok(0)
}

pub async fn ingest(cfg: &AppConfig, file: &str, source: Option<&str>) -> Result<i32, CliError> {
    let text = std::fs::read_to_string(file)?;
    let library = open_library(cfg)?;
    let count = library.ingest(&text, source.unwrap_or(file)).await?;
    println!("indexed {count} chunks from {file}");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn task_with_status(status: &str) -> Task {
        serde_json::from_value(json!({
            "id": "t1",
            "tool": "readFile",
            "params": {"path": "a"},
            "status": status,
            "added_at": "2026-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn exit_codes_reflect_run_outcome() {
        let ok = vec![task_with_status("completed")];
        assert_eq!(exit_code_for(&ok, QueueStatus::Idle), 0);

        let failed = vec![task_with_status("completed"), task_with_status("failed")];
        assert_eq!(exit_code_for(&failed, QueueStatus::Paused), 1);

        // Paused without a failure: dependencies could not be satisfied.
        assert_eq!(exit_code_for(&ok, QueueStatus::Paused), 2);
    }

    #[test]
    fn failure_output_carries_error_lines() {
        let task: Task = serde_json::from_value(json!({
            "id": "t9",
            "tool": "runCommand",
            "params": {"command": "cargo build"},
            "status": "failed",
            "error": "exit code 1: error[E0308]: mismatched types; warning: unused import",
            "added_at": "2026-01-01T00:00:00Z",
        }))
        .unwrap();

        let out = failure_output(&task);
        assert_eq!(out.exit_code, 1);
        assert_eq!(
            out.matched_errors,
            vec![
                "exit code 1: error[E0308]: mismatched types".to_string(),
                "warning: unused import".to_string(),
            ]
        );
    }

    #[test]
    fn query_top_k_defaults_from_config() {
        let cfg = AppConfig::default();
        assert_eq!(effective_top_k(&cfg, None), cfg.library.top_k);
        assert_eq!(effective_top_k(&cfg, Some(9)), 9);
    }
}
