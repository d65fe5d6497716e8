//! Runtime configuration
//!
//! Defaults expect the data files under `data/`; every field can be
//! overridden through a `TRIZ_*` environment variable (a `.env` file is
//! loaded by the binaries first).

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::llm::ChatSettings;
use crate::matrix::MatrixLayout;
use crate::retrieval::BuildOptions;

/// Where parameter and query embeddings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Ollama,
    /// In-process fastembed; needs the `local-embeddings` feature
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "local" | "fastembed" => Ok(Self::Local),
            other => anyhow::bail!("unknown embedding backend {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// One parameter name per line
    pub parameters_path: PathBuf,
    /// Embedded parameter cache (`.json` or `.zst`)
    pub index_path: PathBuf,
    pub matrix_path: PathBuf,
    pub principles_path: PathBuf,
    pub matrix_layout: MatrixLayout,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    /// Reject embeddings of any other length
    pub expected_dims: Option<usize>,
    pub chat_model: String,
    /// Chat temperature and the HTTP timeout for every Ollama/OpenAI call
    pub chat: ChatSettings,
    /// Use an OpenAI-compatible endpoint for chat instead of Ollama
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub build: BuildOptions,
    /// Informational candidates shown per effect
    pub candidates: usize,
    /// Listen address of the HTTP resolver service
    pub server_addr: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::with_data_dir(PathBuf::from("data"))
    }
}

impl ResolverConfig {
    fn with_data_dir(dir: PathBuf) -> Self {
        Self {
            parameters_path: dir.join("parameters.txt"),
            index_path: dir.join("parameters.json"),
            matrix_path: dir.join("matrix.csv"),
            principles_path: dir.join("principles.txt"),
            matrix_layout: MatrixLayout::default(),
            ollama_host: "http://localhost".to_string(),
            ollama_port: 11434,
            embedding_backend: EmbeddingBackend::Ollama,
            embedding_model: "mxbai-embed-large:335m".to_string(),
            expected_dims: None,
            chat_model: "llama3.1:8b".to_string(),
            chat: ChatSettings::default(),
            openai_base_url: None,
            openai_api_key: None,
            build: BuildOptions::default(),
            candidates: 3,
            server_addr: "127.0.0.1:3001".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match get("TRIZ_DATA_DIR") {
            Some(dir) => Self::with_data_dir(PathBuf::from(dir)),
            None => Self::default(),
        };

        if let Some(v) = get("TRIZ_PARAMETERS_PATH") {
            config.parameters_path = v.into();
        }
        if let Some(v) = get("TRIZ_INDEX_PATH") {
            config.index_path = v.into();
        }
        if let Some(v) = get("TRIZ_MATRIX_PATH") {
            config.matrix_path = v.into();
        }
        if let Some(v) = get("TRIZ_PRINCIPLES_PATH") {
            config.principles_path = v.into();
        }
        if let Some(v) = get("TRIZ_MATRIX_DELIMITER") {
            // Not trimmed: a tab is a valid delimiter.
            let mut chars = v.chars();
            config.matrix_layout.delimiter = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => anyhow::bail!("TRIZ_MATRIX_DELIMITER must be a single character, got {:?}", v),
            };
        }
        if let Some(v) = parse(&get, "TRIZ_MATRIX_HEADER_ROWS")? {
            config.matrix_layout.header_rows = v;
        }
        if let Some(v) = parse(&get, "TRIZ_MATRIX_LABEL_COLUMNS")? {
            config.matrix_layout.label_columns = v;
        }
        if let Some(v) = get("TRIZ_OLLAMA_HOST") {
            config.ollama_host = v;
        }
        if let Some(v) = parse(&get, "TRIZ_OLLAMA_PORT")? {
            config.ollama_port = v;
        }
        if let Some(v) = get("TRIZ_EMBEDDING_BACKEND") {
            config.embedding_backend = v.parse()?;
        }
        if let Some(v) = get("TRIZ_EMBEDDING_MODEL") {
            config.embedding_model = v;
        }
        config.expected_dims = parse(&get, "TRIZ_EMBEDDING_DIMS")?;
        if let Some(v) = get("TRIZ_CHAT_MODEL") {
            config.chat_model = v;
        }
        if let Some(v) = parse(&get, "TRIZ_CHAT_TEMPERATURE")? {
            config.chat.temperature = v;
        }
        if let Some(secs) = parse::<u64>(&get, "TRIZ_REQUEST_TIMEOUT_SECS")? {
            config.chat.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.openai_base_url = get("TRIZ_OPENAI_BASE_URL");
        config.openai_api_key = get("OPENAI_API_KEY");
        if let Some(v) = parse(&get, "TRIZ_EMBED_CONCURRENCY")? {
            config.build.concurrency = v;
        }
        if let Some(secs) = parse::<u64>(&get, "TRIZ_EMBED_TIMEOUT_SECS")? {
            config.build.call_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = parse(&get, "TRIZ_CANDIDATES")? {
            config.candidates = v;
        }
        if let Some(v) = get("TRIZ_SERVER_ADDR") {
            config.server_addr = v;
        }

        Ok(config)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value {:?} for {}", raw, key))
        })
        .transpose()
}
