//! # KB Assist CLI (`kb`)
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb sources` | Show the configured source and how many pages it yields |
//! | `kb chunk [--doc <id>]` | Chunk the corpus and print chunk counts (or one page's chunks) |
//! | `kb search "<query>"` | Build the index and print ranked chunks |
//! | `kb ask "<query>"` | Print an answer and its sources |
//! | `kb serve` | Start the HTTP server |
//!
//! Without `--config`, `./config/kb.toml` is used when it exists; otherwise
//! every setting takes its default and pages are read from
//! `./confluence_data`. An explicit `--config` path must exist.
//!
//! Logs go to stderr (filter with `RUST_LOG`); command output goes to stdout.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kb_assist::chunk::chunk_documents;
use kb_assist::config::{self, Config};
use kb_assist::pipeline::Pipeline;
use kb_assist::server;
use kb_assist::source::{DocumentSource, JsonDirSource};

/// KB Assist — question answering over cached wiki pages.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "KB Assist — chunk, index and answer questions over wiki pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults to ./config/kb.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the configured document source and how many pages it yields.
    Sources,

    /// Chunk the corpus and print per-page chunk counts.
    Chunk {
        /// Print the chunks of this page instead.
        #[arg(long)]
        doc: Option<String>,
    },

    /// Build the index and print ranked chunks for a query.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Relevance floor; results must score strictly above it.
        #[arg(long)]
        min_score: Option<f64>,

        /// Index mode override: `lexical` or `vector`.
        #[arg(long)]
        mode: Option<String>,
    },

    /// Build the index and print an answer with its sources.
    Ask {
        query: String,

        /// Number of results the answer is assembled from.
        #[arg(long)]
        limit: Option<usize>,

        /// Span granularity override: `sentence` or `paragraph`.
        #[arg(long)]
        granularity: Option<String>,

        /// Render the answer with the configured generation model.
        #[arg(long)]
        generate: bool,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kb_assist=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sources => {
            let source = JsonDirSource::from_config(&cfg.source);
            let docs = source.load().await?;
            let empty = docs.iter().filter(|d| d.text.trim().is_empty()).count();
            println!("{}", source.name());
            println!("  documents: {}", docs.len());
            println!("  empty:     {}", empty);
        }
        Commands::Chunk { doc } => {
            let docs = JsonDirSource::from_config(&cfg.source).load().await?;
            let chunks = chunk_documents(&docs, &cfg.chunking.params())?;
            match doc {
                Some(id) => {
                    let mine: Vec<_> = chunks.iter().filter(|c| c.document_id == id).collect();
                    if mine.is_empty() {
                        bail!("no chunks for document: {}", id);
                    }
                    for c in mine {
                        println!(
                            "--- {} ({} chars) ---",
                            c.chunk_id,
                            c.text.chars().count()
                        );
                        println!("{}", c.text);
                    }
                }
                None => {
                    for d in &docs {
                        let n = chunks.iter().filter(|c| c.document_id == d.id).count();
                        println!("{}\t{}\t{}", d.id, n, d.title);
                    }
                    println!("total: {} chunks from {} documents", chunks.len(), docs.len());
                }
            }
        }
        Commands::Search {
            query,
            limit,
            min_score,
            mode,
        } => {
            if let Some(mode) = mode {
                cfg.index.mode = mode;
                cfg.validate()?;
            }
            let pipeline = build_pipeline(&cfg).await?;
            let results = pipeline.search(&query, limit, min_score).await?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, r) in results.iter().enumerate() {
                println!("{}. [{:.3}] {} ({})", i + 1, r.score, r.chunk.title, r.chunk.chunk_id);
                println!("   url: {}", r.chunk.url);
                println!("   {}", snippet(&r.chunk.text, 200));
            }
        }
        Commands::Ask {
            query,
            limit,
            granularity,
            generate,
        } => {
            if let Some(granularity) = granularity {
                cfg.answer.granularity = granularity;
                cfg.validate()?;
            }
            let pipeline = build_pipeline(&cfg).await?;
            if generate && !pipeline.has_renderer() {
                bail!("--generate requires [generation] provider to be configured");
            }
            let answer = pipeline.ask(&query, limit, generate).await?;

            println!("{}", answer.text);
            if !answer.supporting_results.is_empty() {
                println!();
                println!("Sources:");
                for (i, r) in answer.supporting_results.iter().enumerate() {
                    println!("  {}. {} [{:.3}] {}", i + 1, r.chunk.title, r.score, r.chunk.url);
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

const DEFAULT_CONFIG_PATH: &str = "./config/kb.toml";

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            config::load_config(Path::new(DEFAULT_CONFIG_PATH))
        }
        None => {
            warn!(path = DEFAULT_CONFIG_PATH, "no config file; using defaults");
            Ok(Config::minimal())
        }
    }
}

async fn build_pipeline(cfg: &Config) -> anyhow::Result<Arc<Pipeline>> {
    let pipeline = Arc::new(Pipeline::from_config(cfg)?);
    pipeline
        .reload(&CancellationToken::new())
        .await
        .context("Failed to build index")?;
    Ok(pipeline)
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
