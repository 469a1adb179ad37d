//! Chat-completion client used by the classifier and the crawler.
//!
//! [`LanguageModel`] is the seam: production code talks to an
//! OpenAI-compatible `POST {base_url}/chat/completions` endpoint through
//! [`OpenAIChat`]; tests substitute canned answers.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::openai;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one user prompt and return the model's text answer.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }
}

pub struct OpenAIChat {
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for OpenAI provider"))?;

        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            url: openai::endpoint(&config.base_url, "chat/completions"),
            api_key: openai::api_key()?,
            client: openai::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        tracing::debug!(model = %self.model, chars = prompt.len(), "chat completion");
        let json =
            openai::post_json(&self.client, &self.url, &self.api_key, &body, self.max_retries)
                .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Build the configured model. Fails when `[llm]` is disabled.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "disabled" => bail!("LLM provider is disabled. Set [llm] provider in config."),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// Parse the first JSON value in a model answer.
///
/// Accepts bare JSON, JSON wrapped in a markdown code fence, or JSON
/// preceded by prose.
pub fn extract_json(answer: &str) -> Result<serde_json::Value> {
    let text = strip_code_fence(answer.trim());

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let Some(start) = text.find(['[', '{']) else {
        bail!("model answer contains no JSON: {}", preview(answer));
    };
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => bail!("model answer is not valid JSON ({}): {}", e, preview(answer)),
        None => bail!("model answer contains no JSON: {}", preview(answer)),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
