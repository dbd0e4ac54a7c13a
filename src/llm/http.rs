//! Vendor-neutral HTTP completion backend

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{LlmBackend, LlmError};
use crate::config::LlmConfig;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

/// POSTs `{model, prompt, max_tokens, temperature}` and reads the reply text
pub struct HttpBackend {
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key: config.api_key.clone(),
            client,
        })
    }
}

/// Reply text from a `text` or `response` field, or the first
/// `choices[].text` of a completions-style body
pub fn extract_text(body: &Value) -> Option<String> {
    body.get("text")
        .or_else(|| body.get("response"))
        .or_else(|| body.pointer("/choices/0/text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl LlmBackend for HttpBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let text = extract_text(&body).ok_or(LlmError::MissingText)?;
        debug!("{} returned {} chars", self.endpoint, text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "http"
    }
}
