//! TOML configuration.
//!
//! Every section except `[source]` has full defaults, so a config file
//! only needs to say where the cached pages live. [`load_config`] parses
//! and validates in one step; invalid values fail before any work starts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::answer::{AnswerParams, Granularity};
use crate::chunk::ChunkParams;
use crate::index::lexical::LexicalParams;
use crate::index::IndexMode;
use crate::search::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// All-default config pointing at `./confluence_data`.
    pub fn minimal() -> Self {
        Self {
            source: SourceConfig {
                root: PathBuf::from("./confluence_data"),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
            },
            chunking: ChunkingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            answer: AnswerConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        self.chunking.params().validate()?;

        // Validate index
        let mode = self.index.mode()?;
        if self.index.max_features == 0 {
            bail!("index.max_features must be >= 1");
        }

        // Validate retrieval
        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if !self.retrieval.min_score.is_finite() {
            bail!("retrieval.min_score must be a finite number");
        }

        // Validate answer
        self.answer.granularity()?;
        if self.answer.max_spans < 1 {
            bail!("answer.max_spans must be >= 1");
        }

        // Validate embedding
        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" | "hash" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, local, or hash.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }
        if self.embedding.provider == "hash" && self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0 when provider is 'hash'");
        }
        let needs_model = !matches!(self.embedding.provider.as_str(), "local" | "hash");
        if self.embedding.is_enabled() && needs_model {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        if mode == IndexMode::Vector && !self.embedding.is_enabled() {
            bail!("index.mode = \"vector\" requires an enabled embedding provider");
        }

        // Validate generation
        match self.generation.provider.as_str() {
            "disabled" | "ollama" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be disabled or ollama.",
                other
            ),
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
            min_chunk_len: default_min_chunk_len(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            window_size: self.window_size,
            overlap: self.overlap,
            min_chunk_len: self.min_chunk_len,
        }
    }
}

fn default_window_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_min_chunk_len() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_true")]
    pub stop_words: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            max_features: default_max_features(),
            stop_words: true,
        }
    }
}

impl IndexConfig {
    pub fn mode(&self) -> Result<IndexMode> {
        Ok(self.mode.parse::<IndexMode>()?)
    }

    pub fn lexical_params(&self) -> LexicalParams {
        LexicalParams {
            max_features: self.max_features,
            stop_words: self.stop_words,
        }
    }
}

fn default_mode() -> String {
    "lexical".to_string()
}
fn default_max_features() -> usize {
    5000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            min_score: self.min_score,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_granularity")]
    pub granularity: String,
    #[serde(default = "default_max_spans")]
    pub max_spans: usize,
    #[serde(default = "default_min_term_len")]
    pub min_term_len: usize,
    #[serde(default = "default_min_overlap")]
    pub min_overlap: usize,
    #[serde(default = "default_min_span_words")]
    pub min_span_words: usize,
    #[serde(default = "default_fallback_sentences")]
    pub fallback_sentences: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            granularity: default_granularity(),
            max_spans: default_max_spans(),
            min_term_len: default_min_term_len(),
            min_overlap: default_min_overlap(),
            min_span_words: default_min_span_words(),
            fallback_sentences: default_fallback_sentences(),
        }
    }
}

impl AnswerConfig {
    pub fn granularity(&self) -> Result<Granularity> {
        Ok(self.granularity.parse::<Granularity>()?)
    }

    pub fn params(&self) -> Result<AnswerParams> {
        Ok(AnswerParams {
            granularity: self.granularity()?,
            max_spans: self.max_spans,
            min_term_len: self.min_term_len,
            min_overlap: self.min_overlap,
            min_span_words: self.min_span_words,
            fallback_sentences: self.fallback_sentences,
        })
    }
}

fn default_granularity() -> String {
    "sentence".to_string()
}
fn default_max_spans() -> usize {
    5
}
fn default_min_term_len() -> usize {
    4
}
fn default_min_overlap() -> usize {
    1
}
fn default_min_span_words() -> usize {
    6
}
fn default_fallback_sentences() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            url: default_ollama_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_model() -> String {
    "llama3.2".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
