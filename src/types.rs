//! Shared error types for the ingestion and retrieval pipeline.

use thiserror::Error;

/// Errors surfaced by the pipeline and its component seams.
///
/// Every ingest-path error aborts only the ingest of the URL that produced
/// it; nothing is committed to the index for that URL. Retrieval errors
/// distinguish a missing collection ([`RagError::NotInitialized`]) from an
/// initialized-but-empty index, which yields an empty result instead of an
/// error. The pipeline never retries on its own.
#[derive(Debug, Error)]
pub enum RagError {
    /// Network-level failure (connect, timeout, non-success status) while
    /// fetching a source document.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The source declared a content type the pipeline has no reader for.
    #[error("no reader for content type '{content_type}' at {url}")]
    UnsupportedContentType { content_type: String, url: String },

    /// The document could not be parsed, or parsed to no usable content.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Chunking produced nothing for a document expected to carry text.
    #[error("no content chunks produced for {0}")]
    NoContent(String),

    /// The embedding provider was unreachable or returned a malformed batch.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The index backend rejected a write.
    #[error("index write failed: {0}")]
    IndexWrite(String),

    /// The index backend failed while reading.
    #[error("index read failed: {0}")]
    IndexRead(String),

    /// The index collection was never created at the configured path.
    #[error("index collection '{0}' is not initialized")]
    NotInitialized(String),

    /// Similarity lookup failed for a reason other than a missing collection.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The generation client failed to produce an answer.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Filesystem-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}
