//! Storage backends for chunk embeddings.
//!
//! The [`Backend`] trait is the narrow seam between the pipeline and a
//! concrete vector store, so the index implementation can be swapped
//! without touching extraction or chunking.
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │  Backend trait  │
//!                 │ (upsert, query) │
//!                 └────────┬────────┘
//!                          │
//!                          ▼
//!                 ┌─────────────────┐
//!                 │     SQLite      │
//!                 │   sqlite-vec    │
//!                 └─────────────────┘
//! ```

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteVectorIndex;

/// A chunk with its embedding, ready for storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier within the collection.
    pub id: String,
    /// Originating URL.
    pub source: String,
    /// Position of this chunk within its source across all ingests.
    pub chunk_index: usize,
    /// The retrievable text.
    pub content: String,
    /// Origin metadata as JSON; values are never null by the time a record
    /// reaches a backend.
    pub metadata: serde_json::Value,
    /// The embedding vector (required for upsert).
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            chunk_index,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Persistent store of (id, embedding, text, metadata) tuples.
///
/// The collection grows monotonically: upsert inserts or overwrites by id,
/// and no delete operation is exposed.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Inserts or overwrites records by id, atomically for the whole batch.
    ///
    /// Every record must carry an embedding whose length equals the
    /// collection dimension; violations and backend failures surface as
    /// [`RagError::IndexWrite`] with nothing committed.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RagError>;

    /// Returns up to `top_k` nearest records by the backend's distance
    /// metric, ordered most-to-least relevant.
    ///
    /// The score is the backend's raw distance value, preserved as computed.
    /// An initialized but empty collection yields an empty vec; a collection
    /// that was never created yields [`RagError::NotInitialized`].
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError>;

    /// Total number of records in the collection.
    async fn count(&self) -> Result<usize, RagError>;

    /// Number of records previously stored for a source URL.
    async fn count_for_source(&self, source: &str) -> Result<usize, RagError>;
}
