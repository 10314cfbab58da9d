use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub logging: LoggingConfig,
    pub queue: QueueConfig,
    pub command: CommandConfig,
    pub library: LibraryConfig,
    pub correction: CorrectionConfig,
}

/// Project root all file tools resolve against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { root: ".".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file directory. Filled with `<data dir>/logs` by the loader when
    /// unset.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QueueConfig {
    /// Checkpoint file path. Filled with `<data dir>/queue.json` by the
    /// loader when unset.
    pub checkpoint_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub timeout_secs: u64,
    /// Extra denylist patterns on top of the built-in validator set.
    pub blocked_patterns: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            blocked_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Vector store file path. Filled with `<data dir>/library.json` by the
    /// loader when unset.
    pub store_path: Option<String>,
    pub embedding: EmbeddingConfig,
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            embedding: EmbeddingConfig::default(),
            top_k: 5,
            min_score: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "nomic-embed-text".into(),
            dimension: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub max_attempts: u32,
    pub lint_fix_command: String,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lint_fix_command: "cargo clippy --fix --allow-dirty --allow-staged".into(),
        }
    }
}
