//! In-process embeddings via fastembed (ONNX runtime).

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;
use tracing::info;

use super::{validate_vector, Embedder, Vector};
use crate::error::{ResolverError, Result};

/// Runs a small sentence-transformer locally instead of calling a server.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
    name: String,
}

impl LocalEmbedder {
    /// Load `AllMiniLML6V2`, downloading it into the fastembed cache on first use.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_model(EmbeddingModel::AllMiniLML6V2)
    }

    pub fn with_model(model: EmbeddingModel) -> anyhow::Result<Self> {
        let name = format!("{:?}", model);
        info!("Initializing local embedding model {}", name);
        let embedding = TextEmbedding::try_new(InitOptions::new(model))?;
        Ok(Self {
            model: Mutex::new(embedding),
            name,
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        let mut model = self.model.lock().await;
        let vector = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| ResolverError::embedding(text, e))?
            .into_iter()
            .next()
            .ok_or_else(|| ResolverError::embedding(text, "model returned no embeddings"))?;
        validate_vector(text, &vector, None)?;
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
