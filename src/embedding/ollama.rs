//! Ollama embedding back-end.

use async_trait::async_trait;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use tracing::debug;

use super::{validate_vector, Embedder, Vector};
use crate::error::{ResolverError, Result};

/// Embeds text through an Ollama server's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
    expected_dims: Option<usize>,
}

impl OllamaEmbedder {
    pub fn new(client: Ollama, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            expected_dims: None,
        }
    }

    /// Reject replies whose length differs from `dims`.
    pub fn with_expected_dims(mut self, dims: Option<usize>) -> Self {
        self.expected_dims = dims;
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        let request = GenerateEmbeddingsRequest::new(
            self.model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| ResolverError::embedding(text, e))?;

        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ResolverError::embedding(text, "reply contained no embeddings"))?;
        validate_vector(text, &vector, self.expected_dims)?;

        debug!("Embedded {} chars with {} ({} dims)", text.len(), self.model, vector.len());
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
