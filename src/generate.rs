//! Optional generative rendering of answers.
//!
//! An [`AnswerRenderer`] turns a prompt into text. [`build_prompt`] wraps
//! the question and the retrieved chunks into the prompt, and
//! [`clean_generation`] strips what some models echo back (the prompt
//! itself, or the question) from their output.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::http::send_json_with_retry;
use crate::models::ScoredResult;

#[async_trait]
pub trait AnswerRenderer: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the renderer named by `config.provider`; `"disabled"` yields none.
pub fn create_renderer(config: &GenerationConfig) -> Result<Option<Arc<dyn AnswerRenderer>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "ollama" => Ok(Some(Arc::new(OllamaRenderer::new(config)?))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Prompt asking the model to answer `query` from the retrieved chunks.
///
/// Each chunk becomes a `Source i: <text>` block, numbered from 1 in rank
/// order.
pub fn build_prompt(query: &str, results: &[ScoredResult]) -> String {
    let context = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Source {}: {}", i + 1, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "\nPlease answer the following question based on the provided information.\n\
         If you can't find a good answer in the context, say you don't know.\n\n\
         Question: {}\n\n\
         Context information:\n{}\n\n\
         Answer:\n",
        query, context
    )
}

/// Remove an echoed prompt and a leading echoed question from model output.
pub fn clean_generation(output: &str, prompt: &str, query: &str) -> String {
    let answer = output.replace(prompt, "");
    let answer = answer.trim();
    match answer.strip_prefix(query) {
        Some(rest) if !query.is_empty() => rest.trim().to_string(),
        _ => answer.to_string(),
    }
}

/// Text generation through Ollama's `POST /api/generate`.
pub struct OllamaRenderer {
    model: String,
    url: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaRenderer {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl AnswerRenderer for OllamaRenderer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        let endpoint = format!("{}/api/generate", self.url);

        let json = send_json_with_retry(
            || self.client.post(&endpoint).json(&body),
            self.max_retries,
            "Ollama",
        )
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn result(text: &str) -> ScoredResult {
        ScoredResult {
            chunk: Chunk {
                chunk_id: "1-0".to_string(),
                document_id: "1".to_string(),
                title: "t".to_string(),
                url: "u".to_string(),
                text: text.to_string(),
                window_index: 0,
                hash: String::new(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_prompt_numbers_sources() {
        let prompt = build_prompt("How do I enroll?", &[result("First."), result("Second.")]);
        assert!(prompt.contains("Question: How do I enroll?"));
        assert!(prompt.contains("Source 1: First.\n\nSource 2: Second."));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn test_clean_strips_echoed_prompt() {
        let prompt = build_prompt("q", &[result("ctx")]);
        let output = format!("{}  Use the enrol button.", prompt);
        assert_eq!(clean_generation(&output, &prompt, "q"), "Use the enrol button.");
    }

    #[test]
    fn test_clean_strips_echoed_question() {
        assert_eq!(
            clean_generation("How do I enroll? Click Enrol.", "unused", "How do I enroll?"),
            "Click Enrol."
        );
        assert_eq!(clean_generation("  plain  ", "p", ""), "plain");
    }

    #[test]
    fn test_create_renderer() {
        assert!(create_renderer(&GenerationConfig::default())
            .unwrap()
            .is_none());
        let cfg = GenerationConfig {
            provider: "ollama".to_string(),
            ..GenerationConfig::default()
        };
        let renderer = create_renderer(&cfg).unwrap().unwrap();
        assert_eq!(renderer.model_name(), "llama3.2");
    }
}
