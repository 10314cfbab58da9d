//! Developer library: chunked, embedded, cosine-ranked document store.
//!
//! Documents are split into overlapping character chunks, embedded through
//! an [`EmbeddingClient`], and kept in a JSON file alongside their vectors.
//! Queries embed the question and rank stored chunks by cosine similarity.

mod embedding;

pub use embedding::{EmbeddingClient, OllamaEmbedding, OpenAiEmbedding};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use deskforge_core::providers::{LibraryHit, LibraryProvider};

const CHUNK_SIZE: usize = 800;
const CHUNK_OVERLAP: usize = 100;

/// Split text into chunks of at most `CHUNK_SIZE` characters with
/// `CHUNK_OVERLAP` characters of context carried between neighbours.
/// Splits on char boundaries, so multi-byte text is safe.
pub fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start = end - CHUNK_OVERLAP;
    }
    chunks
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    id: String,
    source: String,
    text: String,
    vector: Vec<f32>,
}

/// File-backed vector library.
pub struct LocalLibrary {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingClient>,
    min_score: f32,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl LocalLibrary {
    pub fn open(
        path: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingClient>,
        min_score: f32,
    ) -> anyhow::Result<Self> {
        let path = path.into();
        let chunks = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read library store: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("corrupt library store: {}", path.display()))?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            embedder,
            min_score,
            chunks: RwLock::new(chunks),
        })
    }

    async fn persist(&self, chunks: &[StoredChunk]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string(chunks)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("cannot write library store: {}", self.path.display()))
    }
}

#[async_trait]
impl LibraryProvider for LocalLibrary {
    async fn ingest(&self, text: &str, source: &str) -> anyhow::Result<usize> {
        let pieces = chunk_text(text);
        if pieces.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.embed_batch(&pieces).await?;
        let count = pieces.len();

        let mut chunks = self.chunks.write().await;
        for (text, vector) in pieces.into_iter().zip(vectors) {
            chunks.push(StoredChunk {
                id: Uuid::new_v4().to_string(),
                source: source.to_string(),
                text,
                vector,
            });
        }
        self.persist(&chunks).await?;

        tracing::info!(source = %source, chunks = count, "ingested document");
        Ok(count)
    }

    async fn query(&self, question: &str, top_k: usize) -> anyhow::Result<Vec<LibraryHit>> {
        let query_vector = self.embedder.embed(question).await?;

        let chunks = self.chunks.read().await;
        let mut hits: Vec<LibraryHit> = chunks
            .iter()
            .map(|c| LibraryHit {
                source: c.source.clone(),
                text: c.text.clone(),
                score: cosine_similarity(&query_vector, &c.vector),
            })
            .filter(|h| h.score >= self.min_score)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Deterministic embedder: counts occurrences of each probe word.
    struct FakeEmbedder {
        probes: Vec<&'static str>,
    }

    impl FakeEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                probes: vec!["queue", "parser", "socket"],
            })
        }
    }

    #[async_trait]
    impl EmbeddingClient for FakeEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self
                .probes
                .iter()
                .map(|p| text.matches(p).count() as f32)
                .collect())
        }

        fn dimension(&self) -> usize {
            self.probes.len()
        }
    }

    #[test]
    fn chunking_splits_long_text_with_overlap() {
        let text = "x".repeat(CHUNK_SIZE * 2);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), CHUNK_SIZE);
        assert_eq!(chunks[1].len(), CHUNK_SIZE);

        assert!(chunk_text("short").len() == 1);
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("   \n  ").is_empty());
    }

    #[test]
    fn chunking_respects_char_boundaries() {
        let text = "日本語".repeat(CHUNK_SIZE);
        // Would panic on a byte-index split; must not.
        let chunks = chunk_text(&text);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn query_ranks_relevant_chunks_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = LocalLibrary::open(
            dir.path().join("library.json"),
            FakeEmbedder::new(),
            0.1,
        )
        .unwrap();

        library
            .ingest("the queue drains tasks in priority order", "queue.md")
            .await
            .unwrap();
        library
            .ingest("the parser builds a syntax tree", "parser.md")
            .await
            .unwrap();

        let hits = library.query("how does the queue work", 5).await.unwrap();
        assert_eq!(hits[0].source, "queue.md");
        // The parser chunk shares no probe words with the question.
        assert!(hits.iter().all(|h| h.source != "parser.md"));
    }

    #[tokio::test]
    async fn query_honors_top_k() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = LocalLibrary::open(
            dir.path().join("library.json"),
            FakeEmbedder::new(),
            0.0,
        )
        .unwrap();

        for i in 0..4 {
            library
                .ingest("queue notes", &format!("doc{i}.md"))
                .await
                .unwrap();
        }

        let hits = library.query("queue", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("library.json");

        {
            let library = LocalLibrary::open(&path, FakeEmbedder::new(), 0.1).unwrap();
            let count = library.ingest("socket handling notes", "net.md").await.unwrap();
            assert_eq!(count, 1);
        }

        let reopened = LocalLibrary::open(&path, FakeEmbedder::new(), 0.1).unwrap();
        let hits = reopened.query("socket", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "net.md");
    }
}
