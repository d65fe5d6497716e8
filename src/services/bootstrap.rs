//! Wiring from configuration to a ready resolver.

use anyhow::{Context, Result};
use ollama_rs::Ollama;
use std::sync::Arc;
use tracing::info;

use crate::config::{EmbeddingBackend, ResolverConfig};
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::llm::{LlmProvider, OllamaProvider, OpenAiCompatibleProvider};
use crate::matrix::{ContradictionMatrix, PrincipleCatalog};
use crate::resolver::ContradictionResolver;
use crate::retrieval::ParameterIndex;

/// Ollama client for `host:port` whose HTTP calls honour the configured
/// request timeout. A malformed host is an error, not a panic.
pub fn ollama_client(config: &ResolverConfig) -> Result<Ollama> {
    let mut url = reqwest::Url::parse(&config.ollama_host)
        .with_context(|| format!("Invalid Ollama host {:?}", config.ollama_host))?;
    url.set_port(Some(config.ollama_port))
        .map_err(|_| anyhow::anyhow!("Ollama host {:?} cannot carry a port", config.ollama_host))?;
    let http = config.chat.http_client()?;
    Ok(Ollama::builder().url(url).reqwest_client(http).build())
}

pub fn embedder_from_config(config: &ResolverConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_backend {
        EmbeddingBackend::Ollama => {
            let client = ollama_client(config)?;
            info!(
                "Using Ollama embeddings {} at {}",
                config.embedding_model,
                client.url_str()
            );
            Ok(Arc::new(
                OllamaEmbedder::new(client, config.embedding_model.clone())
                    .with_expected_dims(config.expected_dims),
            ))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => Ok(Arc::new(crate::embedding::LocalEmbedder::new()?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => {
            anyhow::bail!("local embeddings need the `local-embeddings` feature")
        }
    }
}

pub fn chat_provider_from_config(config: &ResolverConfig) -> Result<Arc<dyn LlmProvider>> {
    match &config.openai_base_url {
        Some(url) => {
            info!("Using OpenAI-compatible chat at {}", url);
            Ok(Arc::new(OpenAiCompatibleProvider::new(
                url,
                config.openai_api_key.clone(),
                config.chat,
            )?))
        }
        None => Ok(Arc::new(OllamaProvider::new(ollama_client(config)?, config.chat))),
    }
}

/// Load or build the parameter index, load the matrix and principle names,
/// and check that the two data files agree.
pub async fn load_resolver(
    config: &ResolverConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<ContradictionResolver> {
    let index = ParameterIndex::load_or_build(
        &config.index_path,
        &config.parameters_path,
        embedder.as_ref(),
        config.build,
    )
    .await
    .context("Failed to prepare parameter index")?;

    let matrix = ContradictionMatrix::load_with(&config.matrix_path, config.matrix_layout)
        .context("Failed to load contradiction matrix")?;
    let catalog = PrincipleCatalog::load(&config.principles_path)
        .context("Failed to load principle catalog")?;
    matrix.check_catalog(&catalog).with_context(|| {
        format!(
            "{:?} and {:?} are out of sync",
            config.matrix_path, config.principles_path
        )
    })?;

    info!(
        "Resolver ready: {} parameters, {} matrix cells, {} principles",
        index.len(),
        matrix.len(),
        catalog.len()
    );

    Ok(ContradictionResolver::new(
        embedder,
        Arc::new(index),
        Arc::new(matrix),
        Arc::new(catalog),
    ))
}
