//! The LLM primitive the Orchestrator calls for decomposition and chat.
//!
//! Model invocation itself is out of scope (spec §1); this module only
//! defines the `chat(prompt) -> ChatResponse` contract consumers are built
//! against, plus a deterministic double used by the fallback path and by
//! tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
    pub cost: f64,
    pub cached: bool,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, prompt: &str) -> anyhow::Result<ChatResponse>;
}

/// Deterministic stand-in used by tests and wherever no real model is
/// configured. Always proposes a single `respond` subtask covering the
/// whole task description, which is sufficient to exercise decomposition
/// validation without depending on an external service.
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, prompt: &str) -> anyhow::Result<ChatResponse> {
        let content = serde_json::json!([
            {
                "id": "s1",
                "description": "respond to the task",
                "required_capabilities": ["general"],
                "estimated_complexity": "low",
                "dependencies": []
            }
        ])
        .to_string();

        let output_tokens = content.len() as u32 / 4;

        Ok(ChatResponse {
            content,
            model: "mock-decomposer".to_string(),
            provider: "mock".to_string(),
            input_tokens: prompt.len() as u32 / 4,
            output_tokens,
            latency_ms: 1,
            cost: 0.0,
            cached: false,
        })
    }
}
