//! ProofCanvas LLM synthesis
//!
//! Turns the collected sources into one structured venture-analysis report:
//!
//! ```text
//! ┌───────────────┐    ┌──────────────┐    ┌───────────┐    ┌──────────────┐
//! │ SourceDocument│───►│  Synthesis   │───►│    LLM    │───►│ Parse        │
//! │ + facts       │    │  payload +   │    │ (single,  │    │ strategies   │
//! │ + confidence  │    │  prompt      │    │  non-     │    │ direct/fence/│
//! └───────────────┘    └──────────────┘    │ streaming)│    │ brace span   │
//!                                          └───────────┘    └──────┬───────┘
//!                                                                  ▼
//!                                                         serde_json::Value
//! ```
//!
//! The synthesizer only guarantees "valid JSON". Shape conformance is the
//! normalizer's job downstream.

pub mod json_extract;
pub mod providers;
pub mod synthesis;

use async_trait::async_trait;

pub use json_extract::{parse_model_json, ParseStrategy, PARSE_ORDER};
pub use providers::{AnthropicClient, LlmConfig};
pub use synthesis::*;

// ============================================================================
// LLM Provider Interface
// ============================================================================

/// Trait for LLM API providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a (non-streaming) completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Identifier of the model answering requests
    fn model_name(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Config(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
}
