//! Error types for the retrieval and resolution engine.

use std::path::PathBuf;
use thiserror::Error;

/// Every failure the engine can surface to its caller.
///
/// Absent matrix cells and "no principles apply" outcomes are never errors;
/// they come back as empty results.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The embedding capability could not be reached, timed out, or replied
    /// with something that is not a usable vector.
    #[error("embedding unavailable for {text:?}: {reason}")]
    EmbeddingUnavailable { text: String, reason: String },

    /// A candidate vector does not have the query's dimensionality.
    #[error("dimension mismatch at candidate {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// A persisted parameter index failed its structural checks.
    #[error("corrupt parameter index {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    /// A matrix cell held a token that is not a principle position.
    #[error("malformed matrix {path} at row {row}, column {column}: {token:?} is not an integer")]
    MalformedMatrix {
        path: PathBuf,
        row: usize,
        column: usize,
        token: String,
    },

    /// A principle position is outside the catalog.
    #[error("principle position {position} out of range 1..={len}")]
    PositionOutOfRange { position: u32, len: usize },

    /// A parameter name list cannot produce a valid catalog.
    #[error("invalid parameter list {origin}: {reason}")]
    InvalidSource { origin: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An LLM reply could not be turned into the expected structure.
    #[error("could not parse model reply: {0}")]
    Extraction(String),
}

impl ResolverError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn embedding(text: &str, reason: impl std::fmt::Display) -> Self {
        Self::EmbeddingUnavailable {
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
