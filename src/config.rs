//! Pipeline configuration.
//!
//! All components take their settings from an explicit [`RagConfig`] passed
//! in at construction time. Defaults are usable as-is for a local Ollama
//! setup; [`RagConfig::from_env`] layers environment overrides on top
//! (reading a `.env` file first when present).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::types::RagError;

/// Embedding provider settings.
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Base URL of the embedding service.
    pub base_url: String,
    /// Output dimension; constant for the lifetime of an index.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: 768,
        }
    }
}

/// Generation client settings.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub model: String,
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemma3:latest".to_string(),
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Vector index location.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// Collection name; must be a valid SQL identifier.
    pub collection: String,
    /// Directory holding the persisted index database.
    pub persist_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: "corpus".to_string(),
            persist_dir: PathBuf::from("./ragforge_index"),
        }
    }
}

/// Chunk window settings for HTML-derived text.
#[derive(Clone, Copy, Debug)]
pub struct ChunkingConfig {
    /// Upper bound on tokens per chunk.
    pub max_tokens: usize,
    /// Tokens carried over from the previous chunk.
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            overlap_tokens: 32,
        }
    }
}

/// Elements dropped from HTML before text extraction.
#[derive(Clone, Debug, Default)]
pub struct HtmlStripConfig {
    /// Tag names removed wholesale.
    pub tags: Vec<String>,
    /// (tag, class) pairs removed when both match.
    pub tag_classes: Vec<(String, String)>,
}

impl HtmlStripConfig {
    pub fn with_defaults() -> Self {
        Self {
            tags: ["script", "style", "noscript", "nav", "header", "footer", "aside"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            tag_classes: Vec::new(),
        }
    }
}

/// PDF extraction side-effect settings.
#[derive(Clone, Debug)]
pub struct PdfConfig {
    /// Directory embedded page images are written to.
    pub image_dir: PathBuf,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("./images"),
        }
    }
}

/// Network settings for source fetches.
#[derive(Clone, Copy, Debug)]
pub struct NetworkConfig {
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level configuration consumed by the pipeline.
#[derive(Clone, Debug)]
pub struct RagConfig {
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub html: HtmlStripConfig,
    pub pdf: PdfConfig,
    pub network: NetworkConfig,
    /// Number of results returned by a similarity query.
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            html: HtmlStripConfig::with_defaults(),
            pdf: PdfConfig::default(),
            network: NetworkConfig::default(),
            top_k: 5,
        }
    }
}

impl RagConfig {
    /// Builds a configuration from defaults plus environment overrides.
    ///
    /// Reads `.env` first when present. Recognized variables:
    /// `RAGFORGE_EMBEDDING_MODEL`, `RAGFORGE_EMBEDDING_DIM`,
    /// `OLLAMA_BASE_URL`, `RAGFORGE_CHAT_MODEL`, `RAGFORGE_COLLECTION`,
    /// `RAGFORGE_PERSIST_DIR`, `RAGFORGE_CHUNK_TOKENS`,
    /// `RAGFORGE_CHUNK_OVERLAP`, `RAGFORGE_TOP_K`, `RAGFORGE_TIMEOUT_SECS`,
    /// `RAGFORGE_IMAGE_DIR`, `RAGFORGE_STRIP_TAGS` (comma-separated) and
    /// `RAGFORGE_STRIP_CLASSES` (comma-separated `tag.class` pairs).
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(model) = env_var("RAGFORGE_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(dimension) = parse_env::<usize>("RAGFORGE_EMBEDDING_DIM")? {
            config.embedding.dimension = dimension;
        }
        if let Some(base_url) = env_var("OLLAMA_BASE_URL") {
            config.embedding.base_url = base_url.clone();
            config.generation.base_url = base_url;
        }
        if let Some(model) = env_var("RAGFORGE_CHAT_MODEL") {
            config.generation.model = model;
        }
        if let Some(collection) = env_var("RAGFORGE_COLLECTION") {
            config.index.collection = collection;
        }
        if let Some(dir) = env_var("RAGFORGE_PERSIST_DIR") {
            config.index.persist_dir = PathBuf::from(dir);
        }
        if let Some(max_tokens) = parse_env::<usize>("RAGFORGE_CHUNK_TOKENS")? {
            config.chunking.max_tokens = max_tokens;
        }
        if let Some(overlap) = parse_env::<usize>("RAGFORGE_CHUNK_OVERLAP")? {
            config.chunking.overlap_tokens = overlap;
        }
        if let Some(top_k) = parse_env::<usize>("RAGFORGE_TOP_K")? {
            config.top_k = top_k;
        }
        if let Some(secs) = parse_env::<u64>("RAGFORGE_TIMEOUT_SECS")? {
            config.network.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = env_var("RAGFORGE_IMAGE_DIR") {
            config.pdf.image_dir = PathBuf::from(dir);
        }
        if let Some(tags) = env_var("RAGFORGE_STRIP_TAGS") {
            config.html.tags = split_list(&tags);
        }
        if let Some(pairs) = env_var("RAGFORGE_STRIP_CLASSES") {
            config.html.tag_classes = parse_tag_classes(&pairs)?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.index.collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index.persist_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_chunking(mut self, max_tokens: usize, overlap_tokens: usize) -> Self {
        self.chunking = ChunkingConfig {
            max_tokens,
            overlap_tokens,
        };
        self
    }

    #[must_use]
    pub fn with_strip_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.html.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_strip_class(mut self, tag: impl Into<String>, class: impl Into<String>) -> Self {
        self.html.tag_classes.push((tag.into(), class.into()));
        self
    }

    #[must_use]
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pdf.image_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding.dimension = dimension;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.network.request_timeout = timeout;
        self
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>, RagError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| RagError::Config(format!("invalid {key} '{raw}': {err}"))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_tag_classes(raw: &str) -> Result<Vec<(String, String)>, RagError> {
    split_list(raw)
        .into_iter()
        .map(|pair| {
            pair.split_once('.')
                .map(|(tag, class)| (tag.to_string(), class.to_string()))
                .ok_or_else(|| {
                    RagError::Config(format!("invalid tag.class pair '{pair}' in RAGFORGE_STRIP_CLASSES"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = RagConfig::default();
        assert!(config.chunking.overlap_tokens < config.chunking.max_tokens);
        assert!(config.top_k > 0);
        assert!(config.html.tags.iter().any(|tag| tag == "script"));
    }

    #[test]
    fn tag_class_pairs_parse() {
        let pairs = parse_tag_classes("div.sidebar, span.ad").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("div".to_string(), "sidebar".to_string()),
                ("span".to_string(), "ad".to_string())
            ]
        );
        assert!(parse_tag_classes("divsidebar").is_err());
    }

    #[test]
    fn builder_setters_apply() {
        let config = RagConfig::default()
            .with_collection("notes")
            .with_top_k(3)
            .with_chunking(64, 8)
            .with_strip_class("div", "banner");
        assert_eq!(config.index.collection, "notes");
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunking.max_tokens, 64);
        assert_eq!(
            config.html.tag_classes,
            vec![("div".to_string(), "banner".to_string())]
        );
    }
}
