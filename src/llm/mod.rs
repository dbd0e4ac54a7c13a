//! LLM backends
//!
//! The model is an opaque text-completion capability: a prompt goes in, free
//! text comes out. Timeouts belong to the backend.

mod http;
mod rule_based;
mod scripted;

use anyhow::{bail, Result};
use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;

pub use http::HttpBackend;
pub use rule_based::RuleBasedBackend;
pub use scripted::ScriptedBackend;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response has no text field")]
    MissingText,

    #[error("no scripted replies left")]
    Exhausted,

    #[error("{0}")]
    Backend(String),
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Complete `prompt` and return the raw reply
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Build the backend named by `llm.backend`
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn LlmBackend>> {
    match config.backend.as_str() {
        "rule_based" => Ok(Box::new(RuleBasedBackend::new(&config.rule_based))),
        "http" => Ok(Box::new(HttpBackend::from_config(config)?)),
        other => bail!("Unknown llm.backend '{}' (expected rule_based or http)", other),
    }
}
