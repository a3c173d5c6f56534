//! LLM API providers
//!
//! Anthropic Messages API client used for report synthesis.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::{CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Role, Usage};

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_MODEL_ENV: &str = "ANTHROPIC_MODEL";
pub const ANTHROPIC_BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

// ============================================================================
// Configuration
// ============================================================================

/// LLM configuration, loaded from the environment by the binary and passed down.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub anthropic_version: String,
    pub timeout_secs: u64,
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LlmConfig {
    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            timeout_secs: 120,
        }
    }

    /// Load from environment variables
    ///
    /// - `ANTHROPIC_API_KEY` (required)
    /// - `ANTHROPIC_MODEL` (optional; default `claude-sonnet-4-20250514`)
    /// - `ANTHROPIC_BASE_URL` (optional; default `https://api.anthropic.com`)
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env_value(ANTHROPIC_API_KEY_ENV).ok_or_else(|| {
            LlmError::Config(format!("missing required env var: {ANTHROPIC_API_KEY_ENV}"))
        })?;
        let model =
            env_value(ANTHROPIC_MODEL_ENV).unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());

        let mut config = Self::anthropic(&api_key, &model);
        if let Some(url) = env_value(ANTHROPIC_BASE_URL_ENV) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

// ============================================================================
// Anthropic Provider
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

/// Join every `text` part of a Messages API reply.
pub(crate) fn anthropic_text(data: &serde_json::Value) -> String {
    data["content"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|part| part["type"].as_str() == Some("text"))
                .filter_map(|part| part["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/messages", self.config.base_url);

        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        debug!(%url, model = %self.config.model, "anthropic request");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry_after * 1000,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let finish_reason = match data["stop_reason"].as_str() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Other,
        };

        Ok(CompletionResponse {
            content: anthropic_text(&data),
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
                completion_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
            },
            model: data["model"]
                .as_str()
                .unwrap_or(&self.config.model)
                .to_string(),
        })
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LlmConfig::anthropic(" test-key ", "claude-test");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "claude-test");
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.anthropic_version, "2023-06-01");
    }

    #[test]
    fn test_text_parts_are_joined() {
        let data = serde_json::json!({
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "1}"}
            ]
        });
        assert_eq!(anthropic_text(&data), "{\"a\":\n1}");
        assert_eq!(anthropic_text(&serde_json::json!({})), "");
    }
}
