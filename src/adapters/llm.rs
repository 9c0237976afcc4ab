//! Chat completion clients for the OpenAI and Anthropic HTTP APIs.

use crate::domain::model::ReviewType;
use crate::domain::ports::{CompletionRequest, LanguageModel, LlmProvider};
use crate::utils::error::{ReviewError, Result};
use crate::utils::retry::{retry_once, DEFAULT_BACKOFF};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model and sampling parameters bound to a review type.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTier {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelTier {
    pub fn for_review(provider: LlmProvider, review_type: ReviewType) -> Self {
        match (provider, review_type) {
            (LlmProvider::OpenAi, ReviewType::Quick) => Self::sampled("gpt-4o-mini"),
            (LlmProvider::OpenAi, ReviewType::Standard) => Self::sampled("gpt-4o"),
            // Reasoning models reject temperature and max_tokens.
            (LlmProvider::OpenAi, ReviewType::Deep) => Self {
                model: "o3-mini-2025-01-31".to_string(),
                temperature: None,
                max_tokens: None,
            },
            (LlmProvider::Anthropic, ReviewType::Quick) => Self::sampled("claude-3-5-haiku-latest"),
            (LlmProvider::Anthropic, ReviewType::Standard) => Self::sampled("claude-sonnet-4-0"),
            (LlmProvider::Anthropic, ReviewType::Deep) => Self {
                model: "claude-opus-4-0".to_string(),
                temperature: None,
                max_tokens: Some(16384),
            },
        }
    }

    fn sampled(model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: Some(0.0),
            max_tokens: Some(16384),
        }
    }
}

async fn error_from_response(response: reqwest::Response) -> ReviewError {
    let status = response.status().as_u16();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["error"]["message"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .unwrap_or("unknown API error")
        .to_string();
    ReviewError::LlmApiError { status, message }
}

fn empty_completion(model: &str) -> ReviewError {
    ReviewError::LlmApiError {
        status: 200,
        message: format!("{} returned an empty completion", model),
    }
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    tier: ModelTier,
    backoff: Duration,
}

impl OpenAiClient {
    pub fn new(client: Client, api_key: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            tier,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let mut body = json!({
            "model": self.tier.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(temperature) = self.tier.temperature {
            body["temperature"] = json!(temperature);
        }
        // Tiers without a token limit are reasoning models; no override either.
        if let Some(max_tokens) = self
            .tier
            .max_tokens
            .map(|limit| request.max_tokens.unwrap_or(limit))
        {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(empty_completion(&self.tier.model));
        }
        tracing::debug!(
            "🤖 {} completion: {} chars (prompt tokens: {})",
            self.tier.model,
            content.len(),
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0)
        );
        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        retry_once("OpenAI completion", self.backoff, || self.send(&request)).await
    }

    fn model_id(&self) -> &str {
        &self.tier.model
    }
}

pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    tier: ModelTier,
    backoff: Duration,
}

impl AnthropicClient {
    pub fn new(client: Client, api_key: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            client,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            tier,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let mut body = json!({
            "model": self.tier.model,
            "max_tokens": request.max_tokens.or(self.tier.max_tokens).unwrap_or(8192),
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(temperature) = self.tier.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let json: serde_json::Value = response.json().await?;
        let content: String = json["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(empty_completion(&self.tier.model));
        }
        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        retry_once("Anthropic completion", self.backoff, || self.send(&request)).await
    }

    fn model_id(&self) -> &str {
        &self.tier.model
    }
}
