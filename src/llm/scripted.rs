//! Canned replies for tests and dry runs

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

use super::{LlmBackend, LlmError};

/// Replays queued replies in order, then falls back to `default_reply`
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
    default_reply: Option<String>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            default_reply: None,
        }
    }

    /// Answer every prompt with `reply`
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Some(reply.into()),
        }
    }

    /// Queue a failure
    pub async fn push_error(&self, message: impl Into<String>) {
        self.replies.lock().await.push_back(Err(message.into()));
    }

    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(reply.into()));
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        match self.replies.lock().await.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LlmError::Backend(message)),
            None => self.default_reply.clone().ok_or(LlmError::Exhausted),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
