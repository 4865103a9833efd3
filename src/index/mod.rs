//! Similarity indexes over a chunk collection.
//!
//! An [`Index`] pairs the chunks it was built from with one
//! [`SimilarityIndex`] backend. Row `i` of the backend always scores
//! `chunks[i]`, so a score vector can be zipped straight back onto the
//! chunk list.
//!
//! Two backends exist, selected by [`IndexStrategy`]:
//!
//! | Mode | Backend | Query representation |
//! |------|---------|----------------------|
//! | `lexical` | [`lexical::LexicalIndex`] | TF-IDF vector over the fitted vocabulary |
//! | `vector` | [`vector::VectorIndex`] | dense embedding from the injected [`Embedder`] |
//!
//! Building never installs anything: [`build`] either returns a complete
//! `Index` or an error. Swapping the live index is the job of
//! [`Session`](crate::session::Session).

pub mod lexical;
pub mod stop_words;
pub mod vector;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::Chunk;

use self::lexical::{LexicalIndex, LexicalParams};
use self::vector::VectorIndex;

/// Which representation space an index scores in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    Lexical,
    Vector,
}

impl FromStr for IndexMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lexical" => Ok(IndexMode::Lexical),
            "vector" => Ok(IndexMode::Vector),
            other => Err(Error::config(format!(
                "unknown index mode '{}': must be lexical or vector",
                other
            ))),
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Lexical => f.write_str("lexical"),
            IndexMode::Vector => f.write_str("vector"),
        }
    }
}

/// How to build an index.
#[derive(Clone)]
pub enum IndexStrategy {
    Lexical(LexicalParams),
    Vector {
        embedder: Arc<dyn Embedder>,
        /// Texts per embedding call.
        batch_size: usize,
    },
}

impl IndexStrategy {
    pub fn mode(&self) -> IndexMode {
        match self {
            IndexStrategy::Lexical(_) => IndexMode::Lexical,
            IndexStrategy::Vector { .. } => IndexMode::Vector,
        }
    }
}

impl Default for IndexStrategy {
    fn default() -> Self {
        IndexStrategy::Lexical(LexicalParams::default())
    }
}

impl fmt::Debug for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStrategy::Lexical(params) => f.debug_tuple("Lexical").field(params).finish(),
            IndexStrategy::Vector {
                embedder,
                batch_size,
            } => f
                .debug_struct("Vector")
                .field("model", &embedder.model_name())
                .field("dims", &embedder.dims())
                .field("batch_size", batch_size)
                .finish(),
        }
    }
}

/// A backend that scores a query against every row it holds.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    fn mode(&self) -> IndexMode;

    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One cosine score per row, in row order.
    ///
    /// Returns `None` when the query has no representation in this space
    /// (for example, none of its terms are in the lexical vocabulary).
    async fn score(&self, query: &str) -> Result<Option<Vec<f64>>>;
}

/// A built, read-only index over a chunk collection.
pub struct Index {
    chunks: Vec<Chunk>,
    backend: Box<dyn SimilarityIndex>,
    built_at: DateTime<Utc>,
}

impl Index {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn mode(&self) -> IndexMode {
        self.backend.mode()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn backend(&self) -> &dyn SimilarityIndex {
        self.backend.as_ref()
    }

    /// Score `query` against every chunk. See [`SimilarityIndex::score`].
    pub async fn score(&self, query: &str) -> Result<Option<Vec<f64>>> {
        self.backend.score(query).await
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("mode", &self.mode())
            .field("chunks", &self.chunks.len())
            .field("built_at", &self.built_at)
            .finish()
    }
}

/// Build an index over `chunks`.
///
/// An empty chunk collection yields a valid index on which every search
/// returns nothing.
///
/// # Errors
///
/// - [`Error::Config`] for invalid strategy parameters.
/// - [`Error::Build`] when the embedding service fails or returns vectors
///   of the wrong shape.
pub async fn build(chunks: &[Chunk], strategy: &IndexStrategy) -> Result<Index> {
    build_with_cancel(chunks, strategy, &CancellationToken::new()).await
}

/// Like [`build`], but stops with [`Error::Cancelled`] once `cancel` fires.
///
/// The token is checked before any work, between embedding batches and
/// once the backend is complete. A build that sees it fire returns nothing.
/// The TF-IDF fit runs on the blocking pool.
pub async fn build_with_cancel(
    chunks: &[Chunk],
    strategy: &IndexStrategy,
    cancel: &CancellationToken,
) -> Result<Index> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let started = Instant::now();

    let backend: Box<dyn SimilarityIndex> = match strategy {
        IndexStrategy::Lexical(params) => {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let params = *params;
            let index = tokio::task::spawn_blocking(move || {
                let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
                LexicalIndex::fit(&texts, &params)
            })
            .await
            .map_err(|e| Error::Build(format!("lexical fit task failed: {}", e)))??;
            Box::new(index)
        }
        IndexStrategy::Vector {
            embedder,
            batch_size,
        } => Box::new(VectorIndex::build(chunks, embedder.clone(), *batch_size, cancel).await?),
    };

    if backend.len() != chunks.len() {
        return Err(Error::Build(format!(
            "backend produced {} rows for {} chunks",
            backend.len(),
            chunks.len()
        )));
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    info!(
        mode = %backend.mode(),
        rows = chunks.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "index built"
    );

    Ok(Index {
        chunks: chunks.to_vec(),
        backend,
        built_at: Utc::now(),
    })
}

/// Cosine similarity of two dense vectors.
///
/// Returns `0.0` when either vector has zero norm, when they are empty,
/// or when their lengths differ.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_documents, ChunkParams};
    use crate::embedding::HashEmbedder;
    use crate::models::Document;

    /// Fires the token from inside its first `embed` call.
    struct CancelOnEmbed {
        inner: HashEmbedder,
        token: CancellationToken,
    }

    #[async_trait]
    impl Embedder for CancelOnEmbed {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dims(&self) -> usize {
            self.inner.dims()
        }

        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.token.cancel();
            self.inner.embed(texts).await
        }
    }

    fn chunks() -> Vec<Chunk> {
        let docs = vec![
            Document::new("1", "Canvas", "u1", "Canvas enrollment opens in week one."),
            Document::new("2", "Echo", "u2", "Echo360 lecture capture is enabled per unit."),
        ];
        chunk_documents(&docs, &ChunkParams::default()).unwrap()
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("lexical".parse::<IndexMode>().unwrap(), IndexMode::Lexical);
        assert_eq!("vector".parse::<IndexMode>().unwrap(), IndexMode::Vector);
        assert!("bm25".parse::<IndexMode>().unwrap_err().is_config());
        assert_eq!(IndexMode::Vector.to_string(), "vector");
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_build_lexical_rows_match_chunks() {
        let chunks = chunks();
        let index = build(&chunks, &IndexStrategy::default()).await.unwrap();
        assert_eq!(index.mode(), IndexMode::Lexical);
        assert_eq!(index.len(), 2);
        assert_eq!(index.backend().len(), 2);
        assert_eq!(index.chunks(), chunks.as_slice());
    }

    #[tokio::test]
    async fn test_build_empty_is_valid() {
        let index = build(&[], &IndexStrategy::default()).await.unwrap();
        assert!(index.is_empty());
        let scores = index.score("canvas").await.unwrap();
        assert!(scores.map(|s| s.is_empty()).unwrap_or(true));
    }

    #[tokio::test]
    async fn test_build_vector() {
        let strategy = IndexStrategy::Vector {
            embedder: Arc::new(HashEmbedder::new(64)),
            batch_size: 1,
        };
        let index = build(&chunks(), &strategy).await.unwrap();
        assert_eq!(index.mode(), IndexMode::Vector);
        assert_eq!(index.backend().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let err = build_with_cancel(&chunks(), &IndexStrategy::default(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_during_last_batch() {
        let token = CancellationToken::new();
        let strategy = IndexStrategy::Vector {
            embedder: Arc::new(CancelOnEmbed {
                inner: HashEmbedder::new(16),
                token: token.clone(),
            }),
            batch_size: 64,
        };
        let err = build_with_cancel(&chunks(), &strategy, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_rebuild_scores_identically() {
        let chunks = chunks();
        for strategy in [
            IndexStrategy::default(),
            IndexStrategy::Vector {
                embedder: Arc::new(HashEmbedder::new(32)),
                batch_size: 8,
            },
        ] {
            let a = build(&chunks, &strategy).await.unwrap();
            let b = build(&chunks, &strategy).await.unwrap();
            assert_eq!(
                a.score("canvas enrollment").await.unwrap(),
                b.score("canvas enrollment").await.unwrap()
            );
        }
    }
}
