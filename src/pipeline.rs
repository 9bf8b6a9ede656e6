//! Retrieval orchestrator.
//!
//! [`RagPipeline`] ties the component seams together into the two pipeline
//! operations:
//!
//! ```text
//! ingest:   URL → fetch → extract (by content type) → chunk (HTML only)
//!               → normalize metadata → embed batch → build ids → upsert
//! retrieve: query → embed → nearest-neighbor search → (text, metadata, score)
//! ```
//!
//! Any failing ingest step aborts that URL's ingest with the originating
//! error; the index is only touched after the whole embedding batch has
//! succeeded. Callers driving a list of URLs catch per-URL errors and move
//! on — the pipeline itself never retries.

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::chunking::chunk_text;
use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::extraction::{ExtractedBlock, html, pdf};
use crate::ingestion::fetch::{ContentKind, fetch_document};
use crate::ingestion::metadata::normalize_metadata;
use crate::stores::{Backend, ChunkRecord, SqliteVectorIndex};
use crate::types::RagError;

/// One retrieval hit: chunk text, its metadata, and the backend's raw
/// relevance score (for the sqlite backend, cosine distance — lower is more
/// relevant). Scores are preserved exactly as the backend computed them.
#[derive(Clone, Debug)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: Value,
    pub score: f32,
}

/// Orchestrates ingest and retrieve over fetcher, extractor, chunker,
/// embedder and index. A successfully built pipeline is ready; there are no
/// further states.
pub struct RagPipeline {
    config: RagConfig,
    client: Client,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn Backend>,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Convenience constructor: opens (creating if necessary) the sqlite
    /// index named by the configuration and builds the pipeline around it.
    pub async fn open(config: RagConfig, embedder: Arc<dyn Embedder>) -> Result<Self, RagError> {
        let store = SqliteVectorIndex::open(&config.index, embedder.dimension()).await?;
        Self::builder()
            .config(config)
            .embedder_arc(embedder)
            .store_arc(Arc::new(store))
            .build()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Fetches, extracts, chunks, embeds and upserts one source URL.
    ///
    /// Returns the chunk texts that were stored, for progress reporting.
    /// Re-ingesting a URL appends a fresh, disjoint set of ids rather than
    /// overwriting the earlier ones, so unchanged sources accumulate
    /// duplicate content; deduplication is deliberately not performed here.
    pub async fn ingest(&self, url: &Url) -> Result<Vec<String>, RagError> {
        debug!(%url, "ingesting source");
        let document = fetch_document(&self.client, url).await?;

        let blocks = match document.kind() {
            ContentKind::Html => {
                let block = html::extract_html(&document.body, &self.config.html);
                let chunks = chunk_text(
                    &block.text,
                    self.config.chunking.max_tokens,
                    self.config.chunking.overlap_tokens,
                );
                if chunks.is_empty() {
                    return Err(RagError::NoContent(url.to_string()));
                }
                chunks.into_iter().map(ExtractedBlock::new).collect()
            }
            ContentKind::Pdf => pdf::extract_pdf(&document.body, &self.config.pdf.image_dir)?,
            ContentKind::Unsupported => {
                return Err(RagError::UnsupportedContentType {
                    content_type: document.content_type,
                    url: url.to_string(),
                });
            }
        };

        let texts: Vec<String> = blocks.iter().map(|block| block.text.clone()).collect();

        // The whole batch embeds in one call; only after it succeeds does
        // the index see any of this URL's chunks.
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        let base = self.store.count_for_source(url.as_str()).await?;
        let records: Vec<ChunkRecord> = blocks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(offset, (block, embedding))| {
                let sequence = base + offset;
                let id = chunk_id(url, &block, sequence);
                let metadata =
                    normalize_metadata(block.metadata, url.as_str(), &document.content_type);
                ChunkRecord::new(id, url.as_str(), sequence, block.text)
                    .with_metadata(Value::Object(metadata))
                    .with_embedding(embedding)
            })
            .collect();

        self.store.upsert(records).await?;
        info!(%url, chunks = texts.len(), "source ingested");
        Ok(texts)
    }

    /// Embeds the query and returns the top-k nearest chunks.
    ///
    /// Zero matches on an initialized index is a valid empty result; a
    /// collection that was never created surfaces as
    /// [`RagError::NotInitialized`].
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RagError> {
        debug!(query, "retrieving context");
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let embedding = match embeddings.pop() {
            Some(embedding) if embeddings.is_empty() => embedding,
            _ => {
                return Err(RagError::Embedding(
                    "provider did not return exactly one vector for the query".to_string(),
                ));
            }
        };

        let hits = match self.store.query(&embedding, self.config.top_k).await {
            Ok(hits) => hits,
            Err(err @ RagError::NotInitialized(_)) => return Err(err),
            Err(RagError::IndexRead(reason)) => return Err(RagError::Retrieval(reason)),
            Err(other) => return Err(other),
        };

        debug!(hits = hits.len(), "retrieval complete");
        Ok(hits
            .into_iter()
            .map(|(record, score)| RetrievedChunk {
                text: record.content,
                metadata: record.metadata,
                score,
            })
            .collect())
    }
}

/// Deterministic chunk identifier: `{url}-{seq}` for HTML-derived chunks,
/// `{url}-p{page}-{seq}` for page-derived PDF chunks. The sequence continues
/// where earlier ingests of the same URL left off.
fn chunk_id(url: &Url, block: &ExtractedBlock, sequence: usize) -> String {
    match block.metadata.get("page").and_then(Value::as_u64) {
        Some(page) => format!("{url}-p{page}-{sequence}"),
        None => format!("{url}-{sequence}"),
    }
}

/// Builder for [`RagPipeline`]; the embedder and store seams are required.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn Backend>>,
}

impl RagPipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn embedder(self, embedder: impl Embedder + 'static) -> Self {
        self.embedder_arc(Arc::new(embedder))
    }

    #[must_use]
    pub fn embedder_arc(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn store(self, store: impl Backend + 'static) -> Self {
        self.store_arc(Arc::new(store))
    }

    #[must_use]
    pub fn store_arc(mut self, store: Arc<dyn Backend>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<RagPipeline, RagError> {
        let config = self.config.unwrap_or_default();
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Config("pipeline requires an embedder".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::Config("pipeline requires a store".to_string()))?;

        let client = Client::builder()
            .user_agent(concat!("ragforge/", env!("CARGO_PKG_VERSION")))
            .timeout(config.network.request_timeout)
            .use_rustls_tls()
            .build()
            .map_err(|err| RagError::Config(format!("http client: {err}")))?;

        Ok(RagPipeline {
            config,
            client,
            embedder,
            store,
        })
    }
}
