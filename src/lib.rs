//! # KB Assist
//!
//! Question answering over cached wiki (knowledge-base) pages.
//!
//! Pages are cut into overlapping character windows, indexed either
//! lexically (TF-IDF) or with dense embeddings, searched with cosine
//! similarity, and turned into an extractive answer built from the
//! sentences or paragraphs that best match the question.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────┐
//! │ DocumentSource│──▶│ Chunker │──▶│ Index Builder│──▶│ Retriever│──▶│ Assembler│
//! │ (JSON pages) │   │         │   │ lexical/vec  │   │ top-k    │   │ extractive│
//! └──────────────┘   └─────────┘   └──────┬───────┘   └──────────┘   └──────────┘
//!                                         │ Arc<Index> swap
//!                                    ┌────▼────┐
//!                                    │ Session │◀── CLI (kb) / HTTP server
//!                                    └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb sources                          # check the cached pages are readable
//! kb search "canvas enrollment"       # ranked chunks
//! kb ask "how do I enroll students"   # extractive answer + sources
//! kb serve                            # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`source`] | Document sources |
//! | [`chunk`] | Sliding-window chunking |
//! | [`index`] | Lexical and vector similarity indexes |
//! | [`search`] | Ranked retrieval |
//! | [`answer`] | Extractive answer assembly |
//! | [`embedding`] | Embedding services |
//! | [`generate`] | Optional generative rendering |
//! | [`session`] | Live index and atomic rebuilds |
//! | [`pipeline`] | Configured end-to-end pipeline |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generate;
mod http;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod session;
pub mod source;
pub mod text;
