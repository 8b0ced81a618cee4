//! Language model interface

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use call_agent_core::Turn;

use crate::PipelineError;

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Bounded history window, oldest first
    pub history: Vec<Turn>,
    pub user_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            user_message: user_message.into(),
            max_tokens: 256,
            temperature: 0.4,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

/// Language model interface. The runtime is opaque; callers enforce the
/// soft/hard timeouts from configuration.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, PipelineError>;
}

/// Scripted model for tests and local development
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    /// Artificial latency before answering
    pub delay: Mutex<Duration>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: &str) {
        self.responses.lock().push_back(response.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Requests seen so far
    pub fn seen_requests(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, request: GenerationRequest) -> Result<String, PipelineError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.requests.lock().push(request);

        Ok(self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| "Wie kann ich Ihnen weiterhelfen?".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses() {
        let llm = ScriptedLlm::new();
        llm.push_response("Guten Tag!");

        let response = llm
            .generate(GenerationRequest::new("prompt", "Hallo"))
            .await
            .unwrap();
        assert_eq!(response, "Guten Tag!");
        assert_eq!(llm.seen_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_respects_timeout() {
        let llm = ScriptedLlm::new();
        llm.set_delay(Duration::from_secs(6));
        llm.push_response("zu spät");

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            llm.generate(GenerationRequest::new("p", "m")),
        )
        .await;
        assert!(result.is_err());
    }
}
