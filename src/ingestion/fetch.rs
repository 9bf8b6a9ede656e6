//! Source document fetching.

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::types::RagError;

/// Content types the extraction layer can branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Pdf,
    Unsupported,
}

impl ContentKind {
    /// Classifies a declared `Content-Type` header value, ignoring
    /// parameters such as charset.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if essence == "application/pdf" {
            ContentKind::Pdf
        } else if essence.starts_with("text/html") {
            ContentKind::Html
        } else {
            ContentKind::Unsupported
        }
    }
}

/// A fetched source document: body bytes plus the declared content type.
///
/// Ephemeral — fetched per ingest call, never persisted itself.
#[derive(Clone, Debug)]
pub struct FetchedDocument {
    pub url: Url,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl FetchedDocument {
    pub fn kind(&self) -> ContentKind {
        ContentKind::from_content_type(&self.content_type)
    }
}

/// Performs the HTTP GET for one source URL.
///
/// Timeouts come from the client configuration; network failures, timeouts
/// and non-success statuses all surface as [`RagError::Fetch`].
pub async fn fetch_document(client: &Client, url: &Url) -> Result<FetchedDocument, RagError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| fetch_error(url, &err))?
        .error_for_status()
        .map_err(|err| fetch_error(url, &err))?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = response
        .bytes()
        .await
        .map_err(|err| fetch_error(url, &err))?
        .to_vec();

    debug!(%url, %content_type, bytes = body.len(), "fetched source document");
    Ok(FetchedDocument {
        url: url.clone(),
        content_type,
        body,
    })
}

fn fetch_error(url: &Url, err: &reqwest::Error) -> RagError {
    RagError::Fetch {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn content_kind_classification() {
        assert_eq!(
            ContentKind::from_content_type("text/html"),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type("text/html; charset=utf-8"),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type("application/pdf"),
            ContentKind::Pdf
        );
        assert_eq!(
            ContentKind::from_content_type("application/json"),
            ContentKind::Unsupported
        );
        assert_eq!(ContentKind::from_content_type(""), ContentKind::Unsupported);
    }

    #[tokio::test]
    async fn fetch_captures_body_and_content_type() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/page");
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body("<html><body>hi</body></html>");
            })
            .await;

        let url = Url::parse(&server.url("/page")).unwrap();
        let document = fetch_document(&Client::new(), &url).await.unwrap();

        assert_eq!(document.kind(), ContentKind::Html);
        assert_eq!(document.content_type, "text/html; charset=utf-8");
        assert!(!document.body.is_empty());
    }

    #[tokio::test]
    async fn http_errors_surface_as_fetch_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let url = Url::parse(&server.url("/missing")).unwrap();
        let result = fetch_document(&Client::new(), &url).await;
        assert!(matches!(result, Err(RagError::Fetch { .. })));
    }
}
