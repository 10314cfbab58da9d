//! File-backed persistence: queue checkpoints and the knowledge store.
//!
//! Everything lives as pretty-printed JSON under one data directory, so a
//! user can inspect or repair state with a text editor. The knowledge store
//! holds project-scoped key/value entries and an append-only list of
//! cross-project insights.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use deskforge_core::providers::{CheckpointStore, KnowledgeProvider};
use deskforge_core::queue::QueueCheckpoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InsightRecord {
    topic: String,
    insight: String,
    recorded_at: DateTime<Utc>,
}

pub struct FileStore {
    checkpoint_path: PathBuf,
    knowledge_path: PathBuf,
    insights_path: PathBuf,
    // Serializes read-modify-write cycles on the knowledge files.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            checkpoint_path: dir.join("queue.json"),
            knowledge_path: dir.join("knowledge.json"),
            insights_path: dir.join("insights.json"),
            write_lock: Mutex::new(()),
        }
    }

    /// Use an explicit checkpoint file instead of `<dir>/queue.json`.
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt store file: {}", path.display()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, raw)
            .await
            .with_context(|| format!("cannot write {}", path.display()))
    }
}

#[async_trait]
impl CheckpointStore for FileStore {
    async fn save(&self, checkpoint: &QueueCheckpoint) -> anyhow::Result<()> {
        Self::write_json(&self.checkpoint_path, checkpoint).await
    }

    async fn load(&self) -> anyhow::Result<Option<QueueCheckpoint>> {
        Self::read_json(&self.checkpoint_path).await
    }
}

#[async_trait]
impl KnowledgeProvider for FileStore {
    async fn save(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries: HashMap<String, serde_json::Value> =
            Self::read_json(&self.knowledge_path).await?.unwrap_or_default();
        entries.insert(key.to_string(), value);
        Self::write_json(&self.knowledge_path, &entries).await
    }

    async fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let entries: HashMap<String, serde_json::Value> =
            Self::read_json(&self.knowledge_path).await?.unwrap_or_default();
        Ok(entries.get(key).cloned())
    }

    async fn save_insight(&self, topic: &str, insight: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<InsightRecord> =
            Self::read_json(&self.insights_path).await?.unwrap_or_default();
        records.push(InsightRecord {
            topic: topic.to_string(),
            insight: insight.to_string(),
            recorded_at: Utc::now(),
        });
        Self::write_json(&self.insights_path, &records).await
    }

    async fn load_insights(&self) -> anyhow::Result<Vec<String>> {
        let records: Vec<InsightRecord> =
            Self::read_json(&self.insights_path).await?.unwrap_or_default();
        Ok(records
            .into_iter()
            .map(|r| format!("{}: {}", r.topic, r.insight))
            .collect())
    }
}
