//! Boundary contracts consumed by the tool registry.
//!
//! The registry is a stateless dispatcher; all state (filesystem, running
//! processes, git working tree, knowledge mappings, vector index) lives
//! behind these traits. Implementations are provided by `deskforge-plugins`
//! and injected at construction, so tests can substitute stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::queue::QueueCheckpoint;

/// One entry returned by a directory listing.
///
/// Payload types serialize with camelCase keys, matching the wire casing of
/// the tool parameters they travel alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
}

/// A single code-search match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// Outcome of a shell command run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub run_id: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Lines in the output that matched a known error pattern. Consumed by
    /// the self-correction loop.
    pub matched_errors: Vec<String>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Ok/error envelope returned by VCS operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcsOutcome {
    pub ok: bool,
    pub output: String,
}

/// One ranked chunk returned by a developer-library query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryHit {
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Filesystem access scoped to a single project root.
#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    async fn read_dir(&self, path: &str) -> anyhow::Result<Vec<DirEntry>>;
    async fn read_file(&self, path: &str) -> anyhow::Result<String>;
    async fn write_file(&self, path: &str, content: &str) -> anyhow::Result<()>;
    async fn create_dir(&self, path: &str) -> anyhow::Result<()>;
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
    /// Glob match over the project tree, capped by the implementation.
    async fn find_files(&self, pattern: &str) -> anyhow::Result<Vec<String>>;
    /// Substring search over text files, capped by the implementation.
    async fn search_code(&self, query: &str) -> anyhow::Result<Vec<SearchHit>>;
}

/// Shell command execution. `run` blocks until the process exits; buffered
/// output stays retrievable by run id afterwards.
#[async_trait]
pub trait CommandProvider: Send + Sync {
    async fn run(&self, command: &str, cwd: Option<&str>) -> anyhow::Result<CommandOutput>;
    async fn output(&self, run_id: &str) -> anyhow::Result<Option<CommandOutput>>;
    async fn terminate(&self, run_id: &str) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait VcsProvider: Send + Sync {
    async fn status(&self) -> anyhow::Result<VcsOutcome>;
    async fn diff(&self) -> anyhow::Result<VcsOutcome>;
    async fn commit(&self, message: &str) -> anyhow::Result<VcsOutcome>;
    async fn push(&self) -> anyhow::Result<VcsOutcome>;
    async fn pull(&self) -> anyhow::Result<VcsOutcome>;
    /// Apply a patch text. Any temporary artifact the implementation creates
    /// must be released whether the apply succeeds or fails.
    async fn apply_patch(&self, patch: &str) -> anyhow::Result<VcsOutcome>;
}

/// Durable free-form knowledge mappings: project-scoped entries plus
/// cross-project "global insights".
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    async fn save(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()>;
    async fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    async fn save_insight(&self, topic: &str, insight: &str) -> anyhow::Result<()>;
    async fn load_insights(&self) -> anyhow::Result<Vec<String>>;
}

/// Vector-indexed developer library. Chunking and embedding happen behind
/// this trait; the core only sees raw text in and ranked chunks out.
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    async fn ingest(&self, text: &str, source: &str) -> anyhow::Result<usize>;
    async fn query(&self, question: &str, top_k: usize) -> anyhow::Result<Vec<LibraryHit>>;
}

/// Durable store for queue checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &QueueCheckpoint) -> anyhow::Result<()>;
    async fn load(&self) -> anyhow::Result<Option<QueueCheckpoint>>;
}
