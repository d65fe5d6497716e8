//! Similarity ranking over dense vectors.
//!
//! The metric is cosine distance (`1 - cosine similarity`). It decides which
//! parameter wins the top-1 slot and therefore which matrix cell is read, so
//! it is a fixed constant rather than an option.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};

/// Name of the distance metric used by [`rank`].
pub const METRIC: &str = "cosine";

/// One ranked candidate: its position in the input slice and its distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ranked {
    pub index: usize,
    pub distance: f32,
}

/// Cosine distance in `[0, 2]`, accumulated in `f64`.
///
/// A zero-norm vector has similarity 0 with everything (distance 1).
/// Identical non-zero vectors yield exactly 0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    // sqrt(na * nb) rather than sqrt(na) * sqrt(nb): for a == b this is
    // exactly |dot|, so self-similarity is exactly 1.
    let similarity = (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0);
    (1.0 - similarity) as f32
}

/// Rank `candidates` by distance to `query` and keep the `n` closest.
///
/// Output is ascending by distance; equal distances keep the lower index
/// first. Fails with `DimensionMismatch` before any scoring if a candidate's
/// length differs from the query's.
pub fn rank<V>(query: &[f32], candidates: &[V], n: usize) -> Result<Vec<Ranked>>
where
    V: AsRef<[f32]> + Sync,
{
    if let Some((index, bad)) = candidates
        .iter()
        .enumerate()
        .find(|(_, c)| c.as_ref().len() != query.len())
    {
        return Err(ResolverError::DimensionMismatch {
            index,
            expected: query.len(),
            actual: bad.as_ref().len(),
        });
    }

    let mut scored: Vec<Ranked> = candidates
        .par_iter()
        .enumerate()
        .map(|(index, c)| Ranked {
            index,
            distance: cosine_distance(query, c.as_ref()),
        })
        .collect();

    scored.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.index.cmp(&b.index))
    });
    scored.truncate(n);
    Ok(scored)
}
