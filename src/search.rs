//! Ranked retrieval over a built [`Index`].
//!
//! # Ranking
//!
//! 1. Score every chunk with cosine similarity in the index's space.
//! 2. Stable sort by score, descending. Equal scores keep chunk order.
//! 3. Keep the first `top_k`.
//! 4. Drop anything with `score <= min_score`.
//!
//! The floor is applied after the cut, so fewer than `top_k` results come
//! back when some of the best `top_k` fail it.

use std::cmp::Ordering;
use tracing::debug;

use crate::error::Result;
use crate::index::Index;
use crate::models::ScoredResult;

/// Retrieval tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub top_k: usize,
    /// Relevance floor; results must score strictly above it.
    pub min_score: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.1,
        }
    }
}

/// Search `index` for `query`.
///
/// A zero `top_k`, a blank query, or a query with no representation in the
/// index's space all return an empty list.
///
/// # Errors
///
/// [`Error::Embedding`](crate::error::Error::Embedding) when a vector-mode
/// query cannot be embedded.
pub async fn search(
    query: &str,
    index: &Index,
    top_k: usize,
    min_score: f64,
) -> Result<Vec<ScoredResult>> {
    let query = query.trim();
    if top_k == 0 || query.is_empty() || index.is_empty() {
        return Ok(Vec::new());
    }

    let Some(scores) = index.score(query).await? else {
        debug!("query has no representation in the index");
        return Ok(Vec::new());
    };

    let results: Vec<ScoredResult> = rank(&scores, top_k, min_score)
        .into_iter()
        .map(|(i, score)| ScoredResult {
            chunk: index.chunks()[i].clone(),
            score,
        })
        .collect();

    debug!(results = results.len(), top_k, min_score, "search complete");
    Ok(results)
}

/// Search with [`RetrievalParams`].
pub async fn search_with(
    query: &str,
    index: &Index,
    params: &RetrievalParams,
) -> Result<Vec<ScoredResult>> {
    search(query, index, params.top_k, params.min_score).await
}

/// Rank row scores: `(row, score)` pairs, best first, ties in row order,
/// at most `top_k`, all strictly above `min_score`.
pub fn rank(scores: &[f64], top_k: usize, min_score: f64) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = scores
        .iter()
        .map(|&s| if s.is_nan() { 0.0 } else { s })
        .enumerate()
        .collect();
    // `sort_by` is stable.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_k);
    ranked.retain(|&(_, score)| score > min_score);
    ranked
}
