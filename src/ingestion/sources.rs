//! Plain-text URL source lists.
//!
//! One URL per line; blank lines and lines starting with `#` are ignored.

use std::path::Path;

use url::Url;

use crate::types::RagError;

/// Reads and parses a URL list file.
pub async fn read_url_list(path: impl AsRef<Path>) -> Result<Vec<Url>, RagError> {
    let data = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_url_list(&data)
}

/// Parses URL list content. Malformed URLs are configuration errors rather
/// than skipped entries, so typos do not silently shrink the corpus.
pub fn parse_url_list(data: &str) -> Result<Vec<Url>, RagError> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            Url::parse(line).map_err(|err| RagError::Config(format!("invalid url '{line}': {err}")))
        })
        .collect()
}
