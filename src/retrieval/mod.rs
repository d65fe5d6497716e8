//! Retrieval Module
//!
//! Nearest-neighbor search of free text over the parameter taxonomy.

pub mod index;
pub mod ranker;

pub use index::{BuildOptions, Parameter, ParameterIndex, RetrievalResult};
pub use ranker::{cosine_distance, rank, Ranked, METRIC};
