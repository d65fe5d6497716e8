//! Embedding Module
//!
//! Turns text into fixed-length vectors. Back-ends:
//! - Ollama HTTP embeddings (default)
//! - Local fastembed model (feature `local-embeddings`)
//! - Fixed lookup table for deterministic substitution

pub mod ollama;
#[cfg(feature = "local-embeddings")]
pub mod local;

pub use ollama::OllamaEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{ResolverError, Result};

/// A dense embedding vector.
pub type Vector = Vec<f32>;

/// Anything that can embed a single text.
///
/// Implementations make exactly one call to their back-end per `embed` and
/// never cache; callers that need reuse persist the vectors themselves.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`, failing with `EmbeddingUnavailable` on transport errors
    /// or malformed replies.
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Model identifier, for logs and cache diagnostics.
    fn model_name(&self) -> &str;
}

/// Reject vectors that cannot be ranked: empty, wrong size, or non-finite.
pub fn validate_vector(text: &str, vector: &[f32], expected_dims: Option<usize>) -> Result<()> {
    if vector.is_empty() {
        return Err(ResolverError::embedding(text, "empty vector"));
    }
    if let Some(expected) = expected_dims {
        if vector.len() != expected {
            return Err(ResolverError::embedding(
                text,
                format!("expected {} dimensions, got {}", expected, vector.len()),
            ));
        }
    }
    if let Some(index) = vector.iter().position(|x| !x.is_finite()) {
        return Err(ResolverError::embedding(
            text,
            format!("non-finite value at index {}", index),
        ));
    }
    Ok(())
}

/// Embedder backed by an in-memory table of known texts.
///
/// Unknown texts fail with `EmbeddingUnavailable`, which makes it a
/// convenient stand-in for an unreachable service in tests.
#[derive(Debug, Clone, Default)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Vector>,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vector) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    pub fn insert(&mut self, text: impl Into<String>, vector: Vector) {
        self.vectors.insert(text.into(), vector);
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        let vector = self
            .vectors
            .get(text)
            .cloned()
            .ok_or_else(|| ResolverError::embedding(text, "no vector registered"))?;
        validate_vector(text, &vector, None)?;
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}
