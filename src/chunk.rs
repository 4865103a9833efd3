//! Sliding-window text chunker.
//!
//! Splits a document's text into fixed-size character windows that overlap
//! by a configurable amount. Lengths and offsets count Unicode scalar
//! values, so windows never split a multi-byte character.
//!
//! Each chunk gets a deterministic id `"{document_id}-{window_index}"`
//! plus a SHA-256 hash of its text, so re-chunking identical input yields
//! identical chunks.
//!
//! # Algorithm
//!
//! 1. Empty text produces no chunks.
//! 2. Text no longer than `window_size` produces exactly one chunk.
//! 3. Otherwise windows start at `0, step, 2·step, …` while the start is
//!    inside the text, where `step = window_size - overlap`.
//! 4. Windows shorter than `min_chunk_len` (only trailing ones can be)
//!    are dropped.
//!
//! # Example
//!
//! ```rust
//! use kb_assist::chunk::{chunk_document, ChunkParams};
//! use kb_assist::models::Document;
//!
//! let doc = Document::new("42", "Canvas", "https://wiki/42", "x".repeat(2400));
//! let chunks = chunk_document(&doc, &ChunkParams::default()).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[1].chunk_id, "42-1");
//! ```

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Window geometry, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub window_size: usize,
    pub overlap: usize,
    /// Windows shorter than this are too small to be useful and are dropped.
    pub min_chunk_len: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            window_size: 1000,
            overlap: 200,
            min_chunk_len: 100,
        }
    }
}

impl ChunkParams {
    /// Reject geometries that would never advance.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::config("chunking.window_size must be > 0"));
        }
        if self.overlap >= self.window_size {
            return Err(Error::config(format!(
                "chunking.overlap ({}) must be smaller than chunking.window_size ({})",
                self.overlap, self.window_size
            )));
        }
        Ok(())
    }

    /// Distance between consecutive window starts. Always ≥ 1 once validated.
    pub fn step(&self) -> usize {
        self.window_size - self.overlap
    }
}

/// Chunk a single document.
///
/// # Errors
///
/// Returns [`Error::Config`] when `overlap >= window_size` or
/// `window_size == 0`.
pub fn chunk_document(doc: &Document, params: &ChunkParams) -> Result<Vec<Chunk>> {
    params.validate()?;

    let text = doc.text.as_str();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char start, plus the end of the string.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    let char_len = offsets.len() - 1;

    if char_len <= params.window_size {
        return Ok(vec![make_chunk(doc, 0, text)]);
    }

    let step = params.step();
    let mut chunks = Vec::with_capacity(char_len / step + 1);
    let mut start = 0;
    while start < char_len {
        let end = (start + params.window_size).min(char_len);
        if end - start >= params.min_chunk_len {
            let window = &text[offsets[start]..offsets[end]];
            chunks.push(make_chunk(doc, start / step, window));
        }
        start += step;
    }

    debug!(
        document_id = %doc.id,
        chars = char_len,
        chunks = chunks.len(),
        "chunked document"
    );
    Ok(chunks)
}

/// Chunk a corpus, preserving document order and then window order.
pub fn chunk_documents(docs: &[Document], params: &ChunkParams) -> Result<Vec<Chunk>> {
    params.validate()?;
    let mut all = Vec::new();
    for doc in docs {
        all.extend(chunk_document(doc, params)?);
    }
    Ok(all)
}

/// SHA-256 of a text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(doc: &Document, window_index: usize, text: &str) -> Chunk {
    Chunk {
        chunk_id: format!("{}-{}", doc.id, window_index),
        document_id: doc.id.clone(),
        title: doc.title.clone(),
        url: doc.url.clone(),
        text: text.to_string(),
        window_index,
        hash: content_hash(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> Document {
        Document::new(id, "Title", format!("https://wiki/{}", id), text)
    }

    /// Text whose every character is distinguishable by position.
    fn numbered_text(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    fn params(window_size: usize, overlap: usize, min_chunk_len: usize) -> ChunkParams {
        ChunkParams {
            window_size,
            overlap,
            min_chunk_len,
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = chunk_document(&doc("1", ""), &ChunkParams::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_document(&doc("1", "Hello, world!"), &ChunkParams::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].window_index, 0);
        assert_eq!(chunks[0].chunk_id, "1-0");
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].title, "Title");
        assert_eq!(chunks[0].url, "https://wiki/1");
    }

    #[test]
    fn test_exactly_one_window_is_single_chunk() {
        let text = numbered_text(1000);
        let chunks = chunk_document(&doc("1", &text), &ChunkParams::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_2400_chars_gives_three_windows() {
        let text = numbered_text(2400);
        let chunks = chunk_document(&doc("42", &text), &ChunkParams::default()).unwrap();
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].chunk_id, "42-0");
        assert_eq!(chunks[0].text, &text[0..1000]);
        assert_eq!(chunks[1].chunk_id, "42-1");
        assert_eq!(chunks[1].text, &text[800..1800]);
        assert_eq!(chunks[2].chunk_id, "42-2");
        assert_eq!(chunks[2].text, &text[1600..2400]);
        assert_eq!(chunks[2].text.len(), 800);
    }

    #[test]
    fn test_undersized_trailing_window_dropped() {
        // starts: 0, 800, 1600, 2400 -> last window is 50 chars
        let text = numbered_text(2450);
        let chunks = chunk_document(&doc("d", &text), &ChunkParams::default()).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.last().unwrap().window_index, 2);
    }

    #[test]
    fn test_trailing_window_at_floor_kept() {
        // last window is exactly min_chunk_len chars
        let text = numbered_text(2500);
        let chunks = chunk_document(&doc("d", &text), &ChunkParams::default()).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].text, &text[2400..2500]);
        assert_eq!(chunks[3].chunk_id, "d-3");
    }

    #[test]
    fn test_overlap_not_smaller_than_window_is_config_error() {
        let err = chunk_document(&doc("d", "abc"), &params(10, 10, 1)).unwrap_err();
        assert!(err.is_config());
        let err = chunk_document(&doc("d", "abc"), &params(10, 25, 1)).unwrap_err();
        assert!(err.is_config());
        let err = chunk_document(&doc("d", "abc"), &params(0, 0, 0)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_text(5321);
        let p = params(700, 150, 60);
        let c1 = chunk_document(&doc("page", &text), &p).unwrap();
        let c2 = chunk_document(&doc("page", &text), &p).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_chunk_length_bounded_by_window() {
        let text = numbered_text(4099);
        let p = params(512, 64, 10);
        for c in chunk_document(&doc("d", &text), &p).unwrap() {
            assert!(c.text.chars().count() <= 512);
            assert!(c.text.chars().count() >= 10);
        }
    }

    #[test]
    fn test_overlap_invariant() {
        let text = numbered_text(3777);
        let p = params(500, 120, 50);
        let chunks = chunk_document(&doc("d", &text), &p).unwrap();
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let a: Vec<char> = pair[0].text.chars().collect();
            let b: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(pair[1].window_index, pair[0].window_index + 1);
            if b.len() >= p.overlap {
                assert_eq!(&a[a.len() - p.overlap..], &b[..p.overlap]);
            }
        }
    }

    #[test]
    fn test_coverage_reconstructs_text() {
        let text = numbered_text(3333);
        let p = params(600, 100, 1);
        let chunks = chunk_document(&doc("d", &text), &p).unwrap();
        let step = p.step();

        let mut rebuilt = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i + 1 == chunks.len() {
                rebuilt.push_str(&c.text);
            } else {
                rebuilt.extend(c.text.chars().take(step));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_chars_count_as_one() {
        let text = "é".repeat(25);
        let chunks = chunk_document(&doc("d", &text), &params(10, 2, 1)).unwrap();
        assert_eq!(chunks[0].text.chars().count(), 10);
        for c in &chunks {
            assert!(c.text.chars().all(|ch| ch == 'é'));
        }
        // starts: 0, 8, 16, 24
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].text, "é");
    }

    #[test]
    fn test_hash_tracks_text() {
        let chunks = chunk_document(&doc("d", "same"), &ChunkParams::default()).unwrap();
        let again = chunk_document(&doc("other", "same"), &ChunkParams::default()).unwrap();
        assert_eq!(chunks[0].hash, again[0].hash);
        assert_eq!(chunks[0].hash, content_hash("same"));
        assert_eq!(chunks[0].hash.len(), 64);
    }

    #[test]
    fn test_chunk_documents_preserves_order() {
        let docs = vec![doc("a", &numbered_text(1500)), doc("b", ""), doc("c", "tiny")];
        let chunks = chunk_documents(&docs, &ChunkParams::default()).unwrap();
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "a-1", "c-0"]);
    }
}
