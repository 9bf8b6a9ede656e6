//! Generation-side collaborator boundary.
//!
//! The pipeline hands a generation client a list of context strings plus a
//! question and receives back an answer with opaque provider metadata. The
//! grounding prompt is a standalone pure function so clients stay thin and
//! the wording can be tested without a provider.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::types::RagError;

/// Builds the grounding prompt: the model may only answer from the supplied
/// documents and must refuse when they do not contain the answer.
pub fn build_grounded_prompt(contexts: &[String], question: &str) -> String {
    let documents = contexts.join("\n\n");
    format!(
        "Answer the question only using the provided Documents.\n\
         Your tasks are to follow these instructions:\n\
         Use ONLY the provided Documents. If the information is not available, \
         respond with: \"I do not have enough information to answer this question \
         based on the provided sources.\"\n\
         DO NOT invent, assume, or infer information.\n\
         DO NOT use your internal knowledge.\n\
         DO NOT answer with any general information.\n\
         DO NOT add any best practices OUTSIDE of provided Documents.\n\
         DO NOT answer OUTSIDE of question topic.\n\
         DO NOT answer OUTSIDE of provided Documents.\n\
         Use example(s) from Documents only and EXACTLY as written in Documents \
         if applicable.\n\
         Answer the question concisely and shortly.\n\n\
         Documents: {documents}\n\
         Question: {question}\n\
         Answer:"
    )
}

/// An answer plus whatever metadata the provider attached.
#[derive(Clone, Debug)]
pub struct GenerationReply {
    pub answer: String,
    pub metadata: Value,
}

/// Produces a grounded answer from retrieved context and a question.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn complete(
        &self,
        contexts: &[String],
        question: &str,
    ) -> Result<GenerationReply, RagError>;
}

/// Generation client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(client: reqwest::Client, config: &GenerationConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaGenerator {
    async fn complete(
        &self,
        contexts: &[String],
        question: &str,
    ) -> Result<GenerationReply, RagError> {
        let prompt = build_grounded_prompt(contexts, question);
        debug!(model = %self.model, prompt_chars = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|err| RagError::Generation(format!("provider unreachable: {err}")))?
            .error_for_status()
            .map_err(|err| RagError::Generation(format!("provider rejected request: {err}")))?;

        let mut payload: Value = response
            .json()
            .await
            .map_err(|err| RagError::Generation(format!("malformed provider response: {err}")))?;

        let answer = payload
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::Generation("provider response carries no answer text".to_string())
            })?;

        // Everything except the answer text rides along as opaque metadata.
        if let Some(object) = payload.as_object_mut() {
            object.remove("response");
        }

        Ok(GenerationReply {
            answer,
            metadata: payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn prompt_embeds_contexts_and_question() {
        let contexts = vec![
            "A thesis introduction provides background.".to_string(),
            "Introductions span two to three pages.".to_string(),
        ];
        let prompt = build_grounded_prompt(&contexts, "How long is an introduction?");

        for context in &contexts {
            assert!(prompt.contains(context));
        }
        assert!(prompt.contains("Question: How long is an introduction?"));
        assert!(prompt.contains("ONLY the provided Documents"));
    }

    #[tokio::test]
    async fn ollama_generator_returns_answer_and_metadata() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(serde_json::json!({
                    "model": "test-chat",
                    "response": "Two to three pages.",
                    "done": true,
                    "eval_count": 12,
                }));
            })
            .await;

        let config = GenerationConfig {
            model: "test-chat".to_string(),
            base_url: server.base_url(),
        };
        let generator = OllamaGenerator::new(reqwest::Client::new(), &config);
        let reply = generator
            .complete(&["context".to_string()], "How long?")
            .await
            .unwrap();

        assert_eq!(reply.answer, "Two to three pages.");
        assert_eq!(reply.metadata.get("eval_count"), Some(&Value::from(12)));
        assert!(reply.metadata.get("response").is_none());
    }

    #[tokio::test]
    async fn missing_answer_text_is_a_generation_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(serde_json::json!({"done": true}));
            })
            .await;

        let config = GenerationConfig {
            model: "test-chat".to_string(),
            base_url: server.base_url(),
        };
        let generator = OllamaGenerator::new(reqwest::Client::new(), &config);
        let result = generator.complete(&[], "anything").await;
        assert!(matches!(result, Err(RagError::Generation(_))));
    }
}
