//! Dense-embedding index.
//!
//! Each distinct chunk text (keyed by its content hash) is embedded once,
//! in batches, through the injected [`Embedder`]; the vectors are then fanned
//! back out so row `i` belongs to chunk `i`. Queries are embedded with the
//! same embedder at search time.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{cosine_similarity, IndexMode, SimilarityIndex};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::Chunk;

pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    model: String,
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embed every chunk.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a zero batch size, [`Error::Cancelled`] when
    /// `cancel` fires between batches, and [`Error::Build`] for embedder
    /// failures or vectors of the wrong count or dimension.
    pub async fn build(
        chunks: &[Chunk],
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("embedding.batch_size must be >= 1"));
        }
        let dims = embedder.dims();
        let model = embedder.model_name().to_string();

        // Distinct texts in first-seen order, and the slot of every chunk.
        let mut unique: Vec<String> = Vec::new();
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let slot = *slot_of.entry(chunk.hash.as_str()).or_insert_with(|| {
                unique.push(chunk.text.clone());
                unique.len() - 1
            });
            slots.push(slot);
        }

        let mut embedded: Vec<Vec<f32>> = Vec::with_capacity(unique.len());
        let batches = unique.len().div_ceil(batch_size);
        for (i, batch) in unique.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let vectors = embedder
                .embed(batch)
                .await
                .map_err(|e| Error::Build(format!("{:#}", e)))?;

            if vectors.len() != batch.len() {
                return Err(Error::Build(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(Error::Build(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    dims,
                    bad.len()
                )));
            }

            embedded.extend(vectors);
            debug!(batch = i + 1, batches, model = %model, "embedded batch");
        }

        let vectors = slots.into_iter().map(|s| embedded[s].clone()).collect();

        Ok(Self {
            embedder,
            model,
            dims,
            vectors,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}

#[async_trait]
impl SimilarityIndex for VectorIndex {
    fn mode(&self) -> IndexMode {
        IndexMode::Vector
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    async fn score(&self, query: &str) -> Result<Option<Vec<f64>>> {
        if self.vectors.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| Error::Embedding(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))?;

        if query_vec.len() != self.dims {
            return Err(Error::Embedding(format!(
                "query embedding has {} dims, index has {}",
                query_vec.len(),
                self.dims
            )));
        }

        Ok(Some(
            self.vectors
                .iter()
                .map(|v| cosine_similarity(&query_vec, v))
                .collect(),
        ))
    }
}
