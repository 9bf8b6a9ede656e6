//! Content-type-specific extraction of fetched documents.
//!
//! Both branches produce [`ExtractedBlock`]s: plain text plus the metadata
//! describing where it came from. HTML yields a single normalized blob that
//! is chunked downstream; PDF yields one block per page and bypasses the
//! chunker entirely.

pub mod html;
pub mod pdf;

use serde_json::{Map, Value};

/// A unit of extracted text and its origin metadata.
#[derive(Clone, Debug)]
pub struct ExtractedBlock {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl ExtractedBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
