//! TRIZ Contradiction Resolver
//!
//! Maps free-text effect descriptions onto the 39 TRIZ engineering
//! parameters by embedding similarity, then reads the inventive principles
//! for the (improving, worsening) pair from the contradiction matrix:
//! - Pluggable embedders (Ollama, local fastembed, fixed table)
//! - Cosine nearest-neighbor ranking with deterministic ties
//! - Cached parameter index (JSON or zstd+bincode)
//! - Sparse contradiction matrix and principle catalog
//! - LLM-assisted contradiction extraction and solution drafting

pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod matrix;
pub mod resolver;
pub mod retrieval;
pub mod services;
pub mod utils;

// Re-exports for convenience
pub use config::ResolverConfig;
pub use embedding::{Embedder, FixedEmbedder, Vector};
pub use error::{ResolverError, Result};
pub use matrix::{ContradictionMatrix, MatrixLayout, PrincipleCatalog};
pub use resolver::{CandidateReport, ContradictionResolver, ResolutionResult};
pub use retrieval::{BuildOptions, Parameter, ParameterIndex, RetrievalResult};
