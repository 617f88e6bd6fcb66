//! Completion client for Anthropic and OpenAI-compatible chat APIs

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::ports::completion::{CompletionError, CompletionProvider};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Which API to talk to, and with which credentials
#[derive(Clone)]
pub enum LlmProvider {
    Anthropic { model: String, api_key: String },
    /// Any endpoint speaking the OpenAI chat-completions format
    OpenAiCompatible { base_url: String, model: String, api_key: String },
}

impl LlmProvider {
    pub fn anthropic(model: &str, api_key: String) -> Self {
        LlmProvider::Anthropic {
            model: model.to_string(),
            api_key,
        }
    }

    pub fn groq(model: &str, api_key: String) -> Self {
        LlmProvider::OpenAiCompatible {
            base_url: GROQ_URL.to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmProvider::Anthropic { model, .. } | LlmProvider::OpenAiCompatible { model, .. } => model,
        }
    }
}

// API keys stay out of logs.
impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Anthropic { model, .. } => {
                f.debug_struct("Anthropic").field("model", model).finish_non_exhaustive()
            }
            LlmProvider::OpenAiCompatible { base_url, model, .. } => f
                .debug_struct("OpenAiCompatible")
                .field("base_url", base_url)
                .field("model", model)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    system: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, timeout: Duration) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            provider,
            http,
            // Low temperature keeps the line grammar stable
            temperature: 0.3,
            max_tokens: 1000,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Authentication(message),
            _ => CompletionError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn complete_anthropic(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, CompletionError> {
        let request = AnthropicRequest {
            model: model.to_string(),
            system: system.to_string(),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(ANTHROPIC_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let data: AnthropicResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let text: String = data.content.into_iter().filter_map(|b| b.text).collect();
        if text.trim().is_empty() {
            return Err(CompletionError::Malformed("empty completion".into()));
        }
        Ok(text)
    }

    async fn complete_openai(
        &self,
        base_url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system",
                    content: system.to_string(),
                },
                Message {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(base_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let data: ChatResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| CompletionError::Malformed("empty completion".into()))
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        debug!(model = self.provider.model(), "Requesting completion");
        match &self.provider {
            LlmProvider::Anthropic { model, api_key } => {
                self.complete_anthropic(model, api_key, system, prompt).await
            }
            LlmProvider::OpenAiCompatible {
                base_url,
                model,
                api_key,
            } => self.complete_openai(base_url, model, api_key, system, prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_debug_hides_key() {
        let provider = LlmProvider::groq("llama-3.1-8b-instant", "gsk_secret".into());
        let debug = format!("{:?}", provider);
        assert!(debug.contains("llama-3.1-8b-instant"));
        assert!(!debug.contains("gsk_secret"));
    }

    #[test]
    fn test_response_parsing() {
        let openai: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"ACTION: BUY"}}]}"#)
                .unwrap();
        assert_eq!(openai.choices[0].message.content.as_deref(), Some("ACTION: BUY"));

        let anthropic: AnthropicResponse =
            serde_json::from_str(r#"{"content":[{"type":"text","text":"ACTION: SELL"}]}"#).unwrap();
        assert_eq!(anthropic.content[0].text.as_deref(), Some("ACTION: SELL"));
    }

    #[test]
    fn test_client_creation() {
        let provider = LlmProvider::anthropic("claude-3-5-haiku-latest", "k".into());
        let client = LlmClient::new(provider, Duration::from_secs(30)).unwrap();
        assert_eq!(client.provider().model(), "claude-3-5-haiku-latest");
    }
}
