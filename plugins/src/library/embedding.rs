//! Text embedding clients for the developer library.
//!
//! Supports a local Ollama server and an OpenAI-compatible remote endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Turns text into vectors. The library never embeds inline; everything
/// goes through this trait so tests can use a deterministic fake.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use futures::future::try_join_all;

        // Bounded concurrency so a large ingest does not flood the server.
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(8) {
            let batch = try_join_all(chunk.iter().map(|t| self.embed(t))).await?;
            all.extend(batch);
        }
        Ok(all)
    }

    fn dimension(&self) -> usize;
}

/// Local Ollama embedding client.
pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbedding {
    pub fn new(base_url: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            dimension,
        }
    }
}

#[derive(serde::Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
}

#[derive(serde::Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        tracing::debug!(url = %url, model = %self.model, text_len = text.len(), "embedding request");

        let response = self
            .client
            .post(&url)
            .json(&OllamaRequest {
                model: self.model.clone(),
                prompt: text.to_string(),
            })
            .send()
            .await
            .with_context(|| {
                format!(
                    "failed to reach embedding server at {}; is Ollama running?",
                    self.base_url
                )
            })?;

        let status = response.status();
        let result: OllamaResponse = response
            .error_for_status()
            .with_context(|| format!("embedding server returned {status}"))?
            .json()
            .await
            .context("failed to parse embedding response")?;

        Ok(result.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI-compatible remote embedding client.
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedding {
    pub fn new(base_url: String, api_key: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            dimension,
        }
    }
}

#[derive(serde::Serialize)]
struct OpenAiRequest {
    model: String,
    input: Vec<String>,
    encoding_format: String,
}

#[derive(serde::Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(serde::Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .context("embedding response contained no vectors")
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&OpenAiRequest {
                model: self.model.clone(),
                input: texts.to_vec(),
                encoding_format: "float".to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach embedding API at {}", self.base_url))?;

        let result: OpenAiResponse = response
            .error_for_status()?
            .json()
            .await
            .context("failed to parse embedding response")?;

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
