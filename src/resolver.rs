//! Contradiction Resolver
//!
//! Maps a positive-effect and a negative-effect description onto their
//! nearest parameters and reads the inventive principles for that pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::{ResolverError, Result};
use crate::matrix::{ContradictionMatrix, PrincipleCatalog};
use crate::retrieval::{ParameterIndex, RetrievalResult};

/// Outcome of one resolution. `principles` may be empty: not every
/// parameter pair has documented principles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub positive_match: RetrievalResult,
    pub negative_match: RetrievalResult,
    pub principles: Vec<String>,
}

/// Nearest candidates for both effects, for display alongside a result.
/// They never influence which matrix cell is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub positive: Vec<RetrievalResult>,
    pub negative: Vec<RetrievalResult>,
}

/// Read-only pipeline shared across any number of concurrent resolutions.
#[derive(Clone)]
pub struct ContradictionResolver {
    embedder: Arc<dyn Embedder>,
    index: Arc<ParameterIndex>,
    matrix: Arc<ContradictionMatrix>,
    catalog: Arc<PrincipleCatalog>,
}

impl ContradictionResolver {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<ParameterIndex>,
        matrix: Arc<ContradictionMatrix>,
        catalog: Arc<PrincipleCatalog>,
    ) -> Self {
        Self {
            embedder,
            index,
            matrix,
            catalog,
        }
    }

    pub async fn resolve(&self, positive_text: &str, negative_text: &str) -> Result<ResolutionResult> {
        let (positive, negative) = self.candidates(positive_text, negative_text, 1).await?;
        self.read_cell(&positive, positive_text, &negative, negative_text)
    }

    /// Resolve and report the `n` nearest parameters per effect from the
    /// same two embeddings, so the report always agrees with the result.
    pub async fn resolve_with_candidates(
        &self,
        positive_text: &str,
        negative_text: &str,
        n: usize,
    ) -> Result<(ResolutionResult, CandidateReport)> {
        let (mut positive, mut negative) =
            self.candidates(positive_text, negative_text, n.max(1)).await?;
        let result = self.read_cell(&positive, positive_text, &negative, negative_text)?;
        positive.truncate(n);
        negative.truncate(n);
        Ok((result, CandidateReport { positive, negative }))
    }

    /// The `n` nearest parameters for each effect.
    pub async fn explain(
        &self,
        positive_text: &str,
        negative_text: &str,
        n: usize,
    ) -> Result<CandidateReport> {
        let (positive, negative) = self.candidates(positive_text, negative_text, n).await?;
        Ok(CandidateReport { positive, negative })
    }

    async fn candidates(
        &self,
        positive_text: &str,
        negative_text: &str,
        n: usize,
    ) -> Result<(Vec<RetrievalResult>, Vec<RetrievalResult>)> {
        let (positive, negative) = tokio::try_join!(
            self.embedder.embed(positive_text),
            self.embedder.embed(negative_text)
        )?;
        Ok((self.index.closest(&positive, n)?, self.index.closest(&negative, n)?))
    }

    fn read_cell(
        &self,
        positive: &[RetrievalResult],
        positive_text: &str,
        negative: &[RetrievalResult],
        negative_text: &str,
    ) -> Result<ResolutionResult> {
        let positive_match = top(positive, positive_text)?;
        let negative_match = top(negative, negative_text)?;

        let positions = self
            .matrix
            .lookup(positive_match.position, negative_match.position);
        let principles = self.catalog.names_of(positions)?;

        Ok(ResolutionResult {
            positive_match,
            negative_match,
            principles,
        })
    }

    pub fn index(&self) -> &ParameterIndex {
        &self.index
    }

    pub fn matrix(&self) -> &ContradictionMatrix {
        &self.matrix
    }

    pub fn catalog(&self) -> &PrincipleCatalog {
        &self.catalog
    }
}

impl fmt::Debug for ContradictionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContradictionResolver")
            .field("embedder", &self.embedder.model_name())
            .field("parameters", &self.index.len())
            .field("matrix_cells", &self.matrix.len())
            .field("principles", &self.catalog.len())
            .finish()
    }
}

fn top(hits: &[RetrievalResult], text: &str) -> Result<RetrievalResult> {
    // ParameterIndex never holds zero parameters, so this only fires
    // when `closest` was asked for zero results.
    hits.first()
        .cloned()
        .ok_or_else(|| ResolverError::embedding(text, "no parameter matched"))
}
