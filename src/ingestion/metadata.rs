//! Chunk metadata normalization.
//!
//! One pure transformation applied uniformly to HTML- and PDF-derived
//! metadata before upsert: null values become empty strings (index backends
//! may reject nulls), then the originating URL and declared content type are
//! stamped onto every entry.

use serde_json::{Map, Value};

pub const SOURCE_KEY: &str = "source";
pub const CONTENT_TYPE_KEY: &str = "content-type";

/// Blanks nulls and stamps `source` + `content-type`.
pub fn normalize_metadata(
    mut metadata: Map<String, Value>,
    source: &str,
    content_type: &str,
) -> Map<String, Value> {
    for value in metadata.values_mut() {
        if value.is_null() {
            *value = Value::String(String::new());
        }
    }
    metadata.insert(SOURCE_KEY.to_string(), Value::String(source.to_string()));
    metadata.insert(
        CONTENT_TYPE_KEY.to_string(),
        Value::String(content_type.to_string()),
    );
    metadata
}
