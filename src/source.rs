//! Document sources.
//!
//! The retrieval core never fetches anything itself; it takes an ordered
//! list of [`Document`]s from a [`DocumentSource`]. [`JsonDirSource`] reads
//! the page files the wiki downloader caches on disk (one
//! `{id, title, text, url}` JSON object per file); [`StaticSource`] serves
//! an in-memory list.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::Document;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short label for logs and `kb sources`.
    fn name(&self) -> String;

    /// Load every document, in a stable order.
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Cached wiki pages stored as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    root: PathBuf,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_globs: vec!["**/*.json".to_string()],
            exclude_globs: Vec::new(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            root: config.root.clone(),
            include_globs: config.include_globs.clone(),
            exclude_globs: config.exclude_globs.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching files, sorted by relative path.
    fn files(&self) -> Result<Vec<(PathBuf, String)>> {
        if !self.root.is_dir() {
            return Err(Error::Source(format!(
                "source root does not exist: {}",
                self.root.display()
            )));
        }

        let include_set = build_globset(&self.include_globs)?;
        let exclude_set = build_globset(&self.exclude_globs)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| Error::Source(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            files.push((path.to_path_buf(), rel_str));
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

#[async_trait]
impl DocumentSource for JsonDirSource {
    fn name(&self) -> String {
        format!("json:{}", self.root.display())
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for (path, rel_str) in self.files()? {
            match read_page(&path) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(file = %rel_str, error = %e, "skipping unreadable page"),
            }
        }

        info!(source = %self.name(), documents = docs.len(), "documents loaded");
        Ok(docs)
    }
}

fn read_page(path: &Path) -> std::result::Result<Document, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut doc: Document = serde_json::from_str(&content).map_err(|e| e.to_string())?;
    if doc.id.is_empty() {
        doc.id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
    }
    Ok(doc)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::config(format!("invalid glob set: {}", e)))
}

/// A fixed, in-memory document list.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    docs: Vec<Document>,
}

impl StaticSource {
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    fn name(&self) -> String {
        "static".to_string()
    }

    async fn load(&self) -> Result<Vec<Document>> {
        Ok(self.docs.clone())
    }
}
