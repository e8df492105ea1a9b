//! Scripted model backend for tests. Pops a queued response per call and
//! records every prompt it saw.

use super::{ChatMessage, ChatResponse, GenerationConfig, LlmProvider, ToolSchema};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
    pub prompts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    /// Simulated network latency applied before every response.
    delay: Option<std::time::Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond_with(self, text: impl Into<String>) -> Self {
        self.responses
            .lock()
            .push_back(ChatResponse::Content(text.into()));
        self
    }

    pub fn then(self, response: ChatResponse) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pop(&self) -> Result<ChatResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted provider exhausted"))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        match self.pop().await? {
            ChatResponse::Content(text) => Ok(text),
            ChatResponse::ToolCalls(_) => Err(anyhow!("scripted tool calls on a completion path")),
        }
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSchema],
        _config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        let flattened = messages
            .iter()
            .filter_map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().push(flattened);
        self.pop().await
    }
}
