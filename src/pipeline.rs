//! The configured question-answering pipeline.
//!
//! A [`Pipeline`] bundles everything a request handler or CLI command
//! needs: the document source, the [`Session`] holding the live index,
//! retrieval and answer tuning, and an optional generative renderer. It is
//! constructed once (usually from [`Config`]) and shared by reference.

use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::answer::{assemble, AnswerParams};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{Error, Result};
use crate::generate::{build_prompt, clean_generation, create_renderer, AnswerRenderer};
use crate::index::{Index, IndexMode, IndexStrategy};
use crate::models::{Answer, ScoredResult};
use crate::search::{search, RetrievalParams};
use crate::session::{BuildPermit, Session};
use crate::source::{DocumentSource, JsonDirSource};

pub struct Pipeline {
    source: Arc<dyn DocumentSource>,
    session: Session,
    retrieval: RetrievalParams,
    answer: AnswerParams,
    renderer: Option<Arc<dyn AnswerRenderer>>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        session: Session,
        retrieval: RetrievalParams,
        answer: AnswerParams,
    ) -> Self {
        Self {
            source,
            session,
            retrieval,
            answer,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn AnswerRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Wire up a pipeline from a validated config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let strategy = match config.index.mode()? {
            IndexMode::Lexical => IndexStrategy::Lexical(config.index.lexical_params()),
            IndexMode::Vector => {
                let embedder = create_embedder(&config.embedding)
                    .context("Failed to create embedding provider")?
                    .ok_or_else(|| {
                        anyhow::anyhow!("index.mode = \"vector\" requires an embedding provider")
                    })?;
                IndexStrategy::Vector {
                    embedder,
                    batch_size: config.embedding.batch_size,
                }
            }
        };

        let session = Session::new(config.chunking.params(), strategy)?;
        let source = Arc::new(JsonDirSource::from_config(&config.source));
        let mut pipeline = Self::new(
            source,
            session,
            config.retrieval.params(),
            config.answer.params()?,
        );

        if let Some(renderer) =
            create_renderer(&config.generation).context("Failed to create generation provider")?
        {
            pipeline.renderer = Some(renderer);
        }
        Ok(pipeline)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn source(&self) -> &dyn DocumentSource {
        self.source.as_ref()
    }

    pub fn retrieval(&self) -> &RetrievalParams {
        &self.retrieval
    }

    pub fn answer_params(&self) -> &AnswerParams {
        &self.answer
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// Load documents and rebuild the index, waiting for any running build.
    pub async fn reload(&self, cancel: &CancellationToken) -> Result<Arc<Index>> {
        let permit = self.session.begin_build().await;
        self.reload_with(permit, cancel).await
    }

    /// Start a background reload, or fail with [`Error::BuildInProgress`]
    /// when one is already running.
    pub fn try_start_reload(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<Arc<Index>>>> {
        let permit = self.session.try_begin_build()?;
        let pipeline = self.clone();
        Ok(tokio::spawn(async move {
            pipeline.reload_with(permit, &cancel).await
        }))
    }

    async fn reload_with(
        &self,
        permit: BuildPermit,
        cancel: &CancellationToken,
    ) -> Result<Arc<Index>> {
        let docs = self.source.load().await?;
        self.session.build_and_install(permit, &docs, cancel).await
    }

    /// Ranked chunks for `query` from the installed index.
    ///
    /// `top_k` and `min_score` override the configured values.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        min_score: Option<f64>,
    ) -> Result<Vec<ScoredResult>> {
        let index = self.session.current()?;
        let top_k = top_k.unwrap_or(self.retrieval.top_k);
        let min_score = min_score.unwrap_or(self.retrieval.min_score);
        let results = search(query, &index, top_k, min_score).await?;
        info!(results = results.len(), "query served");
        Ok(results)
    }

    /// Answer `query`: search, assemble an extractive answer and, when
    /// `generate` is set and a renderer is configured, replace its text
    /// with the rendered one.
    ///
    /// A renderer failure or empty output keeps the extractive text.
    pub async fn ask(&self, query: &str, top_k: Option<usize>, generate: bool) -> Result<Answer> {
        let results = self.search(query, top_k, None).await?;
        let mut answer = assemble(query, &results, &self.answer);

        if !generate || results.is_empty() {
            return Ok(answer);
        }
        let Some(renderer) = &self.renderer else {
            return Ok(answer);
        };

        let prompt = build_prompt(query, &results);
        match renderer.generate(&prompt).await {
            Ok(output) => {
                let text = clean_generation(&output, &prompt, query);
                if text.is_empty() {
                    warn!(model = renderer.model_name(), "renderer returned no text");
                } else {
                    answer.text = text;
                }
            }
            Err(e) => {
                let e = Error::Generation(format!("{:#}", e));
                warn!(error = %e, "keeping extractive answer");
            }
        }
        Ok(answer)
    }
}
