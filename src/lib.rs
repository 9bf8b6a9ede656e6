//! Retrieval-augmented corpus pipeline.
//!
//! ```text
//! URL list ──► ingestion::fetch ──► extraction (html | pdf)
//!                                        │
//!                         HTML blob ──► chunking (token windows)
//!                         PDF pages ───────┐ (one unit per page)
//!                                          │
//!                  ingestion::metadata ◄───┘
//!                           │
//!                   embeddings::Embedder (one batch per source)
//!                           │
//!              stores::Backend upsert ──► sqlite-vec index
//!
//! query ──► embeddings ──► stores::Backend query ──► (text, metadata, score)
//!                                   │
//!                     generation::GenerationClient (grounded answer)
//! ```
//!
//! The pipeline ingests heterogeneous web sources into a persistent vector
//! index and retrieves ranked, scored context for a downstream generation
//! step. Components meet at narrow trait seams ([`Embedder`], [`Backend`],
//! [`GenerationClient`]) composed by [`RagPipeline`], so the index backend
//! or embedding provider can be swapped without touching extraction.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragforge::{MockEmbedder, RagConfig, RagPipeline};
//! use url::Url;
//!
//! let config = RagConfig::from_env()?;
//! let pipeline = RagPipeline::open(config, Arc::new(MockEmbedder::new())).await?;
//!
//! pipeline.ingest(&Url::parse("https://example.com/guide")?).await?;
//! let context = pipeline.retrieve("How should an introduction open?").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod extraction;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use config::RagConfig;
pub use embeddings::{Embedder, MockEmbedder, OllamaEmbedder};
pub use generation::{GenerationClient, GenerationReply, OllamaGenerator, build_grounded_prompt};
pub use pipeline::{RagPipeline, RagPipelineBuilder, RetrievedChunk};
pub use stores::{Backend, ChunkRecord, SqliteVectorIndex};
pub use types::RagError;
