//! Core data models that flow through the retrieval pipeline.
//!
//! Documents come from a [`DocumentSource`](crate::source::DocumentSource),
//! are cut into [`Chunk`]s, indexed, and come back out of a query as
//! [`ScoredResult`]s inside an [`Answer`].

use serde::{Deserialize, Serialize};

/// A wiki page as cached by the downloader: `{id, title, url, text}`.
///
/// Every field defaults to an empty string, so a page without `text`
/// deserializes to an empty document rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub text: String,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            text: text.into(),
        }
    }
}

/// One overlapping window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{document_id}-{window_index}"`.
    pub chunk_id: String,
    pub document_id: String,
    pub title: String,
    pub url: String,
    pub text: String,
    pub window_index: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub chunk: Chunk,
    pub score: f64,
}

/// An extractive answer and the results it was assembled from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub supporting_results: Vec<ScoredResult>,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Page ids are strings in the cached files but numeric in some exports.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}
