//! Embedding provider boundary.
//!
//! The pipeline only needs one capability: turn a batch of texts into
//! fixed-dimension vectors, order-preserving, one vector per input. The
//! whole batch for an ingest goes through a single call so a provider
//! failure can abort the ingest before the index is touched.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::types::RagError;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Output dimension; constant for the lifetime of the provider.
    fn dimension(&self) -> usize;
}

/// Embedding client for an Ollama-compatible `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    pub fn new(client: reqwest::Client, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
        }
    }
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch = texts.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|err| RagError::Embedding(format!("provider unreachable: {err}")))?
            .error_for_status()
            .map_err(|err| RagError::Embedding(format!("provider rejected batch: {err}")))?;

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(format!("malformed provider response: {err}")))?;

        if payload.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                payload.embeddings.len(),
                texts.len()
            )));
        }
        for vector in &payload.embeddings {
            if vector.len() != self.dimension {
                return Err(RagError::Embedding(format!(
                    "provider returned dimension {} where {} was configured",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(payload.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic embedder for tests and offline demos.
///
/// Vectors are derived from a text hash, so identical inputs embed
/// identically across runs and distinct inputs diverge.
#[derive(Clone, Debug)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { dimension: 16 }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut state = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
            });

        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|_| {
                state = splitmix64(state);
                // Map to [-1, 1).
                (state >> 11) as f32 / (1u64 << 53) as f32 * 2.0 - 1.0
            })
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];
        let first = embedder.embed(&inputs).await.unwrap();
        let second = embedder.embed(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
        assert!(first.iter().all(|vector| vector.len() == 16));
    }

    #[tokio::test]
    async fn ollama_embedder_round_trips_a_batch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(serde_json::json!({
                    "model": "test-embed",
                    "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]],
                }));
            })
            .await;

        let config = EmbeddingConfig {
            model: "test-embed".to_string(),
            base_url: server.base_url(),
            dimension: 3,
        };
        let embedder = OllamaEmbedder::new(reqwest::Client::new(), &config);
        let vectors = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn ollama_embedder_rejects_ragged_batches() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(serde_json::json!({
                    "embeddings": [[0.1, 0.2, 0.3]],
                }));
            })
            .await;

        let config = EmbeddingConfig {
            model: "test-embed".to_string(),
            base_url: server.base_url(),
            dimension: 3,
        };
        let embedder = OllamaEmbedder::new(reqwest::Client::new(), &config);
        let result = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .await;

        assert!(matches!(result, Err(RagError::Embedding(_))));
    }

    #[tokio::test]
    async fn ollama_embedder_surfaces_http_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("boom");
            })
            .await;

        let config = EmbeddingConfig {
            model: "test-embed".to_string(),
            base_url: server.base_url(),
            dimension: 3,
        };
        let embedder = OllamaEmbedder::new(reqwest::Client::new(), &config);
        let result = embedder.embed(&["one".to_string()]).await;

        assert!(matches!(result, Err(RagError::Embedding(_))));
    }
}
