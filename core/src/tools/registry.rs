//! Tool dispatch.
//!
//! `ToolRegistry` maps one parsed call to exactly one externally visible
//! operation on a provider and returns a structured JSON payload. It holds
//! no state of its own; providers own everything.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::providers::{
    CommandOutput, CommandProvider, KnowledgeProvider, LibraryProvider, VcsProvider,
    WorkspaceProvider,
};

use super::call::{RunCommandParams, ToolCall};
use super::retry::{run_with_retry, ExponentialBackoff, RetryConfig, RetryStrategy};
use super::validator::CommandValidator;

pub const DEFAULT_QUERY_TOP_K: usize = 5;

/// Anything the task queue can execute against. The registry is the real
/// implementation; tests substitute stubs.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(&self, tool: &str, params: &Value) -> Result<Value, ToolError>;
}

pub struct ToolRegistry {
    workspace: Arc<dyn WorkspaceProvider>,
    commands: Arc<dyn CommandProvider>,
    vcs: Arc<dyn VcsProvider>,
    knowledge: Arc<dyn KnowledgeProvider>,
    library: Arc<dyn LibraryProvider>,
    validator: CommandValidator,
    retry: RetryConfig,
}

impl ToolRegistry {
    pub fn new(
        workspace: Arc<dyn WorkspaceProvider>,
        commands: Arc<dyn CommandProvider>,
        vcs: Arc<dyn VcsProvider>,
        knowledge: Arc<dyn KnowledgeProvider>,
        library: Arc<dyn LibraryProvider>,
    ) -> Self {
        Self {
            workspace,
            commands,
            vcs,
            knowledge,
            library,
            validator: CommandValidator::new(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_validator(mut self, validator: CommandValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn dispatch(&self, call: ToolCall) -> Result<Value, ToolError> {
        let tool = call.name();
        match call {
            ToolCall::ReadFile(p) => {
                let content = self
                    .workspace
                    .read_file(&p.path)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "path": p.path, "content": content }))
            }
            ToolCall::WriteFile(p) => {
                self.workspace
                    .write_file(&p.path, &p.content)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "path": p.path, "written": p.content.len() }))
            }
            ToolCall::ListDirectory(p) => {
                let entries = self
                    .workspace
                    .read_dir(&p.path)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                to_payload(tool, &entries)
            }
            ToolCall::CreateDirectory(p) => {
                self.workspace
                    .create_dir(&p.path)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "path": p.path, "created": true }))
            }
            ToolCall::DeletePath(p) => {
                self.workspace
                    .delete(&p.path)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "path": p.path, "deleted": true }))
            }
            ToolCall::FindFiles(p) => {
                let matches = self
                    .workspace
                    .find_files(&p.pattern)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "pattern": p.pattern, "matches": matches }))
            }
            ToolCall::SearchCode(p) => {
                let hits = self
                    .workspace
                    .search_code(&p.query)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                to_payload(tool, &hits)
            }
            ToolCall::RunCommand(p) => self.run_command(p).await,
            ToolCall::SaveKnowledge(p) => {
                self.knowledge
                    .save(&p.key, p.value)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "key": p.key, "saved": true }))
            }
            ToolCall::LoadKnowledge(p) => {
                let value = self
                    .knowledge
                    .load(&p.key)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "key": p.key, "value": value }))
            }
            ToolCall::SaveGlobalInsight(p) => {
                self.knowledge
                    .save_insight(&p.topic, &p.insight)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "topic": p.topic, "saved": true }))
            }
            ToolCall::LoadGlobalInsights => {
                let insights = self
                    .knowledge
                    .load_insights()
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "insights": insights }))
            }
            ToolCall::IngestDocument(p) => {
                let source = p.source.as_deref().unwrap_or("inline");
                let chunks = self
                    .library
                    .ingest(&p.text, source)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                Ok(json!({ "source": source, "chunks": chunks }))
            }
            ToolCall::QueryDeveloperLibrary(p) => {
                let top_k = p.top_k.unwrap_or(DEFAULT_QUERY_TOP_K);
                let hits = self
                    .library
                    .query(&p.question, top_k)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                to_payload(tool, &hits)
            }
            ToolCall::GenerateDiff => {
                let outcome = self
                    .vcs
                    .diff()
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                if !outcome.ok {
                    return Err(ToolError::execution(tool, outcome.output));
                }
                Ok(json!({ "diff": outcome.output }))
            }
            ToolCall::ApplyPatch(p) => {
                let outcome = self
                    .vcs
                    .apply_patch(&p.patch)
                    .await
                    .map_err(|e| ToolError::execution(tool, e.to_string()))?;
                if !outcome.ok {
                    return Err(ToolError::execution(tool, outcome.output));
                }
                Ok(json!({ "applied": true, "output": outcome.output }))
            }
        }
    }

    /// Validate, then run with optional exponential backoff. The validator
    /// runs once, before any attempt; a nonzero exit code is an
    /// `ExecutionFailure` and therefore retryable.
    async fn run_command(&self, p: RunCommandParams) -> Result<Value, ToolError> {
        self.validator.validate(&p.command)?;

        // `retries` counts extra attempts on top of the first try.
        let max_attempts = p.retries.unwrap_or(0).saturating_add(1);
        let strategy = ExponentialBackoff::new(RetryConfig {
            max_attempts,
            ..self.retry.clone()
        });

        let output = run_with_retry(&strategy as &dyn RetryStrategy, |attempt| {
            let command = p.command.clone();
            let cwd = p.cwd.clone();
            async move {
                if attempt > 0 {
                    tracing::info!(attempt, command = %command, "re-running command");
                }
                let output = self
                    .commands
                    .run(&command, cwd.as_deref())
                    .await
                    .map_err(|e| ToolError::execution("runCommand", e.to_string()))?;
                if output.succeeded() {
                    Ok(output)
                } else {
                    Err(command_failure(&output))
                }
            }
        })
        .await?;

        to_payload("runCommand", &output)
    }
}

fn command_failure(output: &CommandOutput) -> ToolError {
    let detail = if output.matched_errors.is_empty() {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            String::from("no diagnostic output")
        } else {
            stderr.to_string()
        }
    } else {
        output.matched_errors.join("; ")
    };
    ToolError::execution(
        "runCommand",
        format!("exit code {}: {detail}", output.exit_code),
    )
}

fn to_payload<T: serde::Serialize>(tool: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::execution(tool, e.to_string()))
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn invoke(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        let call = ToolCall::parse(tool, params)?;
        self.dispatch(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DirEntry, LibraryHit, SearchHit, VcsOutcome};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct StubWorkspace;

    #[async_trait]
    impl WorkspaceProvider for StubWorkspace {
        async fn read_dir(&self, path: &str) -> anyhow::Result<Vec<DirEntry>> {
            Ok(vec![DirEntry {
                name: "main.rs".into(),
                path: format!("{path}/main.rs"),
                is_directory: false,
            }])
        }
        async fn read_file(&self, path: &str) -> anyhow::Result<String> {
            if path == "missing.rs" {
                anyhow::bail!("no such file: {path}");
            }
            Ok(format!("contents of {path}"))
        }
        async fn write_file(&self, _path: &str, _content: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn create_dir(&self, _path: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn delete(&self, _path: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn find_files(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
            Ok(vec![format!("src/{pattern}")])
        }
        async fn search_code(&self, query: &str) -> anyhow::Result<Vec<SearchHit>> {
            Ok(vec![SearchHit {
                path: "src/lib.rs".into(),
                line: 1,
                text: query.into(),
            }])
        }
    }

    /// Counts runs; `fail-n-times <n>` fails with exit 1 until n runs
    /// happened, then succeeds.
    struct StubCommands {
        runs: AtomicU32,
        spawned: Mutex<Vec<String>>,
    }

    impl StubCommands {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicU32::new(0),
                spawned: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandProvider for StubCommands {
        async fn run(&self, command: &str, _cwd: Option<&str>) -> anyhow::Result<CommandOutput> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            self.spawned.lock().unwrap().push(command.to_string());
            let fail_until: u32 = command
                .strip_prefix("fail-n-times ")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            if run <= fail_until {
                Ok(CommandOutput {
                    run_id: format!("run-{run}"),
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: "boom".into(),
                    matched_errors: vec!["error: boom".into()],
                })
            } else {
                Ok(CommandOutput {
                    run_id: format!("run-{run}"),
                    exit_code: 0,
                    stdout: "ok".into(),
                    stderr: String::new(),
                    matched_errors: vec![],
                })
            }
        }
        async fn output(&self, _run_id: &str) -> anyhow::Result<Option<CommandOutput>> {
            Ok(None)
        }
        async fn terminate(&self, _run_id: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    struct StubVcs {
        ok: bool,
    }

    #[async_trait]
    impl VcsProvider for StubVcs {
        async fn status(&self) -> anyhow::Result<VcsOutcome> {
            Ok(VcsOutcome {
                ok: true,
                output: "clean".into(),
            })
        }
        async fn diff(&self) -> anyhow::Result<VcsOutcome> {
            Ok(VcsOutcome {
                ok: self.ok,
                output: if self.ok {
                    "--- a/x\n+++ b/x".into()
                } else {
                    "not a git repository".into()
                },
            })
        }
        async fn commit(&self, _message: &str) -> anyhow::Result<VcsOutcome> {
            Ok(VcsOutcome {
                ok: true,
                output: String::new(),
            })
        }
        async fn push(&self) -> anyhow::Result<VcsOutcome> {
            Ok(VcsOutcome {
                ok: true,
                output: String::new(),
            })
        }
        async fn pull(&self) -> anyhow::Result<VcsOutcome> {
            Ok(VcsOutcome {
                ok: true,
                output: String::new(),
            })
        }
        async fn apply_patch(&self, _patch: &str) -> anyhow::Result<VcsOutcome> {
            Ok(VcsOutcome {
                ok: self.ok,
                output: String::new(),
            })
        }
    }

    struct StubKnowledge;

    #[async_trait]
    impl KnowledgeProvider for StubKnowledge {
        async fn save(&self, _key: &str, _value: Value) -> anyhow::Result<()> {
            Ok(())
        }
        async fn load(&self, key: &str) -> anyhow::Result<Option<Value>> {
            Ok(if key == "known" {
                Some(json!({"fact": 1}))
            } else {
                None
            })
        }
        async fn save_insight(&self, _topic: &str, _insight: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn load_insights(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["prefer rustls".into()])
        }
    }

    struct StubLibrary;

    #[async_trait]
    impl LibraryProvider for StubLibrary {
        async fn ingest(&self, text: &str, _source: &str) -> anyhow::Result<usize> {
            Ok(text.len() / 10 + 1)
        }
        async fn query(&self, question: &str, top_k: usize) -> anyhow::Result<Vec<LibraryHit>> {
            Ok(vec![
                LibraryHit {
                    source: "doc".into(),
                    text: question.into(),
                    score: 0.9,
                };
                top_k.min(1)
            ])
        }
    }

    fn registry(commands: Arc<StubCommands>, vcs_ok: bool) -> ToolRegistry {
        ToolRegistry::new(
            Arc::new(StubWorkspace),
            commands,
            Arc::new(StubVcs { ok: vcs_ok }),
            Arc::new(StubKnowledge),
            Arc::new(StubLibrary),
        )
        .with_retry_config(RetryConfig {
            base_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 3,
        })
    }

    #[tokio::test]
    async fn read_file_returns_content() {
        let reg = registry(StubCommands::new(), true);
        let out = reg
            .invoke("readFile", &json!({"path": "src/main.rs"}))
            .await
            .unwrap();
        assert_eq!(out["content"], "contents of src/main.rs");
    }

    #[tokio::test]
    async fn payloads_use_camel_case_keys() {
        let reg = registry(StubCommands::new(), true);
        let out = reg
            .invoke("listDirectory", &json!({"path": "src"}))
            .await
            .unwrap();
        assert_eq!(out[0]["isDirectory"], false);
        assert!(out[0].get("is_directory").is_none());

        let out = reg
            .invoke("runCommand", &json!({"command": "true"}))
            .await
            .unwrap();
        assert_eq!(out["exitCode"], 0);
        assert!(out.get("runId").is_some());
        assert!(out.get("matchedErrors").is_some());
    }

    #[tokio::test]
    async fn provider_error_becomes_execution_failure() {
        let reg = registry(StubCommands::new(), true);
        let err = reg
            .invoke("readFile", &json!({"path": "missing.rs"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailure { tool, message } => {
                assert_eq!(tool, "readFile");
                assert!(message.contains("missing.rs"));
            }
            other => panic!("expected ExecutionFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_command_never_reaches_the_provider() {
        let commands = StubCommands::new();
        let reg = registry(commands.clone(), true);
        let err = reg
            .invoke("runCommand", &json!({"command": "rm -rf /"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::BlockedCommand { .. }));
        assert!(commands.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn command_retries_until_success() {
        let commands = StubCommands::new();
        let reg = registry(commands.clone(), true);
        let out = reg
            .invoke(
                "runCommand",
                &json!({"command": "fail-n-times 2", "retries": 2}),
            )
            .await
            .unwrap();
        assert_eq!(out["exitCode"], 0);
        assert_eq!(commands.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn command_without_retries_fails_on_first_nonzero_exit() {
        let commands = StubCommands::new();
        let reg = registry(commands.clone(), true);
        let err = reg
            .invoke("runCommand", &json!({"command": "fail-n-times 9"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailure { message, .. } => {
                assert!(message.contains("exit code 1"));
                assert!(message.contains("error: boom"));
            }
            other => panic!("expected ExecutionFailure, got {other:?}"),
        }
        assert_eq!(commands.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn vcs_error_envelope_fails_the_tool() {
        let reg = registry(StubCommands::new(), false);
        let err = reg.invoke("generateDiff", &Value::Null).await.unwrap_err();
        match err {
            ToolError::ExecutionFailure { tool, message } => {
                assert_eq!(tool, "generateDiff");
                assert!(message.contains("not a git repository"));
            }
            other => panic!("expected ExecutionFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn knowledge_and_library_round_trip() {
        let reg = registry(StubCommands::new(), true);

        let out = reg
            .invoke("loadKnowledge", &json!({"key": "known"}))
            .await
            .unwrap();
        assert_eq!(out["value"]["fact"], 1);

        let out = reg
            .invoke("queryDeveloperLibrary", &json!({"question": "how?"}))
            .await
            .unwrap();
        assert_eq!(out.as_array().unwrap().len(), 1);

        let out = reg.invoke("loadGlobalInsights", &Value::Null).await.unwrap();
        assert_eq!(out["insights"][0], "prefer rustls");
    }

    #[tokio::test]
    async fn unknown_tool_surfaces_from_invoke() {
        let reg = registry(StubCommands::new(), true);
        let err = reg.invoke("makeCoffee", &Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "makeCoffee"));
    }
}
