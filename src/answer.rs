//! Extractive answer assembly.
//!
//! The retrieved chunks are cut into candidate spans (sentences or
//! paragraphs), each span is scored by how many query terms it contains,
//! and the best spans are joined into the answer text. When no span
//! mentions enough query terms the leading text of the best result is
//! used instead, so a non-empty result list always yields some text.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::index::Index;
use crate::models::{Answer, ScoredResult};
use crate::search::{search_with, RetrievalParams};
use crate::text::{lowercase_words, paragraphs, sentences};

/// Answer text when retrieval found nothing.
pub const NO_INFORMATION: &str =
    "I couldn't find relevant information about this topic in the Knowledge Base.";

/// Unit of text the assembler selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Sentence,
    Paragraph,
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sentence" => Ok(Granularity::Sentence),
            "paragraph" => Ok(Granularity::Paragraph),
            other => Err(Error::config(format!(
                "unknown answer granularity '{}': must be sentence or paragraph",
                other
            ))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Sentence => f.write_str("sentence"),
            Granularity::Paragraph => f.write_str("paragraph"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerParams {
    pub granularity: Granularity,
    /// Most spans joined into one answer.
    pub max_spans: usize,
    /// Query words shorter than this are ignored.
    pub min_term_len: usize,
    /// Spans matching fewer query terms are discarded.
    pub min_overlap: usize,
    /// Spans with fewer whitespace-separated words are not candidates.
    pub min_span_words: usize,
    /// Sentences taken from the top result when nothing matches.
    pub fallback_sentences: usize,
}

impl Default for AnswerParams {
    fn default() -> Self {
        Self {
            granularity: Granularity::Sentence,
            max_spans: 5,
            min_term_len: 4,
            min_overlap: 1,
            min_span_words: 6,
            fallback_sentences: 3,
        }
    }
}

/// Assemble an extractive answer from ranked `results`.
///
/// `supporting_results` is always `results`, unchanged.
pub fn assemble(query: &str, results: &[ScoredResult], params: &AnswerParams) -> Answer {
    let Some(top) = results.first() else {
        return Answer {
            text: NO_INFORMATION.to_string(),
            supporting_results: Vec::new(),
        };
    };

    let terms = query_terms(query, params.min_term_len);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut scored: Vec<(&str, usize)> = Vec::new();
    for result in results {
        for span in split(&result.chunk.text, params.granularity) {
            if span.split_whitespace().count() < params.min_span_words || !seen.insert(span) {
                continue;
            }
            let overlap = overlap(span, &terms);
            if overlap >= params.min_overlap {
                scored.push((span, overlap));
            }
        }
    }

    // Stable: equal scores keep result rank, then position in the chunk.
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(params.max_spans);

    let text = if scored.is_empty() {
        leading_text(&top.chunk.text, params)
    } else {
        scored
            .iter()
            .map(|(span, _)| *span)
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    Answer {
        text,
        supporting_results: results.to_vec(),
    }
}

/// Search `index` and assemble an answer from the results.
pub async fn answer(
    query: &str,
    index: &Index,
    retrieval: &RetrievalParams,
    params: &AnswerParams,
) -> Result<Answer> {
    let results = search_with(query, index, retrieval).await?;
    Ok(assemble(query, &results, params))
}

/// Lowercase query words of at least `min_len` characters.
pub fn query_terms(query: &str, min_len: usize) -> HashSet<String> {
    lowercase_words(query)
        .filter(|w| w.chars().count() >= min_len)
        .collect()
}

/// Number of `terms` present among the words of `span`.
fn overlap(span: &str, terms: &HashSet<String>) -> usize {
    if terms.is_empty() {
        return 0;
    }
    let words: HashSet<String> = lowercase_words(span).collect();
    terms.iter().filter(|t| words.contains(*t)).count()
}

fn split(text: &str, granularity: Granularity) -> Vec<&str> {
    match granularity {
        Granularity::Sentence => sentences(text),
        Granularity::Paragraph => paragraphs(text),
    }
}

fn leading_text(text: &str, params: &AnswerParams) -> String {
    let lead = match params.granularity {
        Granularity::Paragraph => paragraphs(text)
            .first()
            .map(|p| p.to_string())
            .unwrap_or_default(),
        Granularity::Sentence => sentences(text)
            .into_iter()
            .take(params.fallback_sentences.max(1))
            .collect::<Vec<_>>()
            .join(" "),
    };
    if lead.is_empty() {
        text.trim().to_string()
    } else {
        lead
    }
}
