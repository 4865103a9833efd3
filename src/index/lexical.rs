//! TF-IDF lexical index.
//!
//! Fitting learns a capped vocabulary and per-term IDF weights from the
//! chunk texts and stores one L2-normalised sparse row per chunk. The same
//! fitted state turns a query into a vector in the same space, so scoring
//! is a sparse dot product.
//!
//! # Weighting
//!
//! - tokens: lowercase words of at least two characters, English stop
//!   words removed unless disabled;
//! - vocabulary: the `max_features` most frequent terms across the corpus
//!   (ties broken alphabetically), columns in alphabetical order;
//! - `idf(t) = ln((1 + n) / (1 + df(t))) + 1`;
//! - `w(t, d) = count(t, d) × idf(t)`, then each row is scaled to unit
//!   length.

use async_trait::async_trait;
use std::collections::HashMap;

use super::stop_words::is_stop_word;
use super::{IndexMode, SimilarityIndex};
use crate::error::{Error, Result};
use crate::text::lowercase_words;

const MIN_TOKEN_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalParams {
    /// Vocabulary cap.
    pub max_features: usize,
    /// Drop English stop words.
    pub stop_words: bool,
}

impl Default for LexicalParams {
    fn default() -> Self {
        Self {
            max_features: 5000,
            stop_words: true,
        }
    }
}

/// Sparse row: `(column, weight)` pairs sorted by column.
type SparseRow = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: LexicalParams,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<SparseRow>,
}

impl LexicalIndex {
    /// Fit the vocabulary and weights over `texts` and weight every text.
    pub fn fit(texts: &[&str], params: &LexicalParams) -> Result<Self> {
        if params.max_features == 0 {
            return Err(Error::config("index.max_features must be >= 1"));
        }

        let docs: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t, params)).collect();

        let mut total: HashMap<&str, usize> = HashMap::new();
        let mut df: HashMap<&str, usize> = HashMap::new();
        for tokens in &docs {
            let mut seen: Vec<&str> = Vec::with_capacity(tokens.len());
            for tok in tokens {
                *total.entry(tok.as_str()).or_insert(0) += 1;
                seen.push(tok.as_str());
            }
            seen.sort_unstable();
            seen.dedup();
            for tok in seen {
                *df.entry(tok).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(&str, usize)> = total.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        terms.truncate(params.max_features);
        terms.sort_by(|a, b| a.0.cmp(b.0));

        let n = docs.len() as f64;
        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (col, (term, _)) in terms.iter().enumerate() {
            let df = df.get(term).copied().unwrap_or(0) as f64;
            idf.push(((1.0 + n) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term.to_string(), col);
        }

        let mut index = Self {
            params: *params,
            vocabulary,
            idf,
            rows: Vec::new(),
        };
        let rows = docs.iter().map(|tokens| index.weigh(tokens)).collect();
        index.rows = rows;
        Ok(index)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Column of `term`, if it made it into the vocabulary.
    pub fn column(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Normalised TF-IDF vector of `text` in this index's space.
    pub fn transform(&self, text: &str) -> SparseRow {
        self.weigh(&tokenize(text, &self.params))
    }

    fn weigh(&self, tokens: &[String]) -> SparseRow {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for tok in tokens {
            if let Some(&col) = self.vocabulary.get(tok) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(col, count)| (col, count as f64 * self.idf[col]))
            .collect();
        row.sort_by_key(|&(col, _)| col);

        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm < f64::EPSILON {
            return Vec::new();
        }
        for (_, w) in row.iter_mut() {
            *w /= norm;
        }
        row
    }
}

#[async_trait]
impl SimilarityIndex for LexicalIndex {
    fn mode(&self) -> IndexMode {
        IndexMode::Lexical
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    async fn score(&self, query: &str) -> Result<Option<Vec<f64>>> {
        let q = self.transform(query);
        if q.is_empty() {
            return Ok(None);
        }
        // Rows and query are unit length, so the dot product is the cosine.
        Ok(Some(self.rows.iter().map(|row| sparse_dot(&q, row)).collect()))
    }
}

fn tokenize(text: &str, params: &LexicalParams) -> Vec<String> {
    lowercase_words(text)
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|w| !(params.stop_words && is_stop_word(w)))
        .collect()
}

/// Dot product of two column-sorted sparse vectors.
fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(texts: &[&str]) -> LexicalIndex {
        LexicalIndex::fit(texts, &LexicalParams::default()).unwrap()
    }

    #[test]
    fn test_stop_words_and_short_tokens_excluded() {
        let idx = fit(&["The a I of Canvas is x"]);
        assert_eq!(idx.vocabulary_len(), 1);
        assert!(idx.column("canvas").is_some());
        assert!(idx.column("the").is_none());
    }

    #[test]
    fn test_stop_words_kept_when_disabled() {
        let params = LexicalParams {
            max_features: 10,
            stop_words: false,
        };
        let idx = LexicalIndex::fit(&["the canvas"], &params).unwrap();
        assert!(idx.column("the").is_some());
    }

    #[test]
    fn test_vocabulary_cap_keeps_most_frequent() {
        let params = LexicalParams {
            max_features: 2,
            stop_words: true,
        };
        let idx = LexicalIndex::fit(
            &["canvas canvas canvas moodle", "echo echo zoom", "canvas echo"],
            &params,
        )
        .unwrap();
        assert_eq!(idx.vocabulary_len(), 2);
        assert_eq!(idx.column("canvas"), Some(0));
        assert_eq!(idx.column("echo"), Some(1));
        assert!(idx.column("moodle").is_none());
    }

    #[test]
    fn test_vocabulary_cap_tie_broken_alphabetically() {
        let params = LexicalParams {
            max_features: 1,
            stop_words: true,
        };
        let idx = LexicalIndex::fit(&["zoom moodle"], &params).unwrap();
        assert!(idx.column("moodle").is_some());
        assert!(idx.column("zoom").is_none());
    }

    #[test]
    fn test_zero_max_features_is_config_error() {
        let params = LexicalParams {
            max_features: 0,
            stop_words: true,
        };
        assert!(LexicalIndex::fit(&["x"], &params).unwrap_err().is_config());
    }

    #[test]
    fn test_rows_are_unit_length() {
        let idx = fit(&["canvas enrollment canvas", "lecture capture echo"]);
        for row in &idx.rows {
            let norm: f64 = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let idx = fit(&["canvas enrollment", "canvas grades", "canvas quizzes"]);
        let row = idx.transform("canvas enrollment");
        let w = |term: &str| {
            let col = idx.column(term).unwrap();
            row.iter().find(|(c, _)| *c == col).unwrap().1
        };
        assert!(w("enrollment") > w("canvas"));
    }

    #[tokio::test]
    async fn test_score_cosine() {
        let idx = fit(&[
            "Canvas enrollment is automatic",
            "Echo lecture capture",
            "Canvas enrollment is automatic",
        ]);
        let scores = idx.score("canvas enrollment").await.unwrap().unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores[0] > 0.5);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[0], scores[2]);
    }

    #[tokio::test]
    async fn test_unknown_query_has_no_representation() {
        let idx = fit(&["Canvas enrollment"]);
        assert!(idx.score("zebra").await.unwrap().is_none());
        assert!(idx.score("the of and").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunk_without_vocabulary_scores_zero() {
        let idx = fit(&["the and of", "canvas"]);
        let scores = idx.score("canvas").await.unwrap().unwrap();
        assert_eq!(scores[0], 0.0);
        assert!((scores[1] - 1.0).abs() < 1e-9);
    }
}
