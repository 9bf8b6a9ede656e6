//! End-to-end walkthrough: ingest a URL list into a local index, then
//! retrieve context for a question and print the grounding prompt.
//!
//! ```text
//! RAGFORGE_URLS=./urls.txt cargo run --example pipeline_demo
//! ```
//!
//! Uses the deterministic mock embedder by default so the demo runs without
//! a local embedding service; set `RAGFORGE_USE_OLLAMA=1` to talk to a real
//! Ollama instance instead.

use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use url::Url;

use ragforge::ingestion::read_url_list;
use ragforge::{
    Embedder, MockEmbedder, OllamaEmbedder, RagConfig, RagError, RagPipeline,
    build_grounded_prompt,
};

#[tokio::main]
async fn main() -> Result<(), RagError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RagConfig::from_env()?;

    let embedder: Arc<dyn Embedder> = if env::var("RAGFORGE_USE_OLLAMA").is_ok() {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|err| RagError::Config(err.to_string()))?;
        Arc::new(OllamaEmbedder::new(client, &config.embedding))
    } else {
        Arc::new(MockEmbedder::new())
    };

    let pipeline = RagPipeline::open(config, embedder).await?;

    let urls = match env::var("RAGFORGE_URLS") {
        Ok(path) => read_url_list(&path).await?,
        Err(_) => vec![Url::parse("https://doc.rust-lang.org/book/ch01-00-getting-started.html")
            .map_err(|err| RagError::Config(err.to_string()))?],
    };

    println!("Ingesting {} source(s)", urls.len());
    let mut stored = 0usize;
    for url in &urls {
        // Per-URL failures are reported and skipped so one bad source never
        // stops the rest of the list.
        match pipeline.ingest(url).await {
            Ok(chunks) => {
                stored += chunks.len();
                println!("  ✓ {url} ({} chunks)", chunks.len());
            }
            Err(err) => println!("  ✗ {url}: {err}"),
        }
    }
    println!("Stored {stored} chunks total\n");

    let question = env::var("RAGFORGE_QUESTION")
        .unwrap_or_else(|_| "How do I get started?".to_string());
    let hits = pipeline.retrieve(&question).await?;

    if hits.is_empty() {
        println!("No context retrieved — ingest some sources first.");
        return Ok(());
    }

    println!("Top {} context chunk(s) for {question:?}:", hits.len());
    for hit in &hits {
        let source = hit
            .metadata
            .get("source")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown");
        println!("  score {:.4}  {}", hit.score, source);
    }

    let contexts: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();
    let prompt = build_grounded_prompt(&contexts, &question);
    println!("\nGrounding prompt ({} chars) ready for a generation client.", prompt.len());

    Ok(())
}
