use crate::domain::model::{
    PaperRecord, ProgressEvent, ReviewType, SearchMethod, SearchQuery, SourceOrigin,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(alias = "claude")]
    Anthropic,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAi => f.write_str("openai"),
            LlmProvider::Anthropic => f.write_str("anthropic"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = crate::utils::error::ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            other => Err(crate::utils::error::ReviewError::InvalidConfigValueError {
                field: "provider".to_string(),
                value: other.to_string(),
                reason: "expected one of: openai, anthropic".to_string(),
            }),
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn topic(&self) -> &str;
    fn api_key(&self) -> &str;
    fn llm_provider(&self) -> LlmProvider;
    fn llm_base_url(&self) -> Option<&str>;
    fn search_method(&self) -> SearchMethod;
    fn review_type(&self) -> ReviewType;
    fn min_references(&self) -> usize;
    fn include_scholar(&self) -> bool;
    fn local_papers_dir(&self) -> &str;
    fn pubmed_base_url(&self) -> &str;
    fn scholar_base_url(&self) -> &str;
    fn ncbi_api_key(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn concurrent_requests(&self) -> usize;
}

/// A single chat-style completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Overrides the tier's output limit when set.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
    fn model_id(&self) -> &str;
}

#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<PaperRecord>>;

    fn origin(&self) -> SourceOrigin;

    /// Failures of a required source abort the run; others degrade to zero results.
    fn required(&self) -> bool {
        true
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

/// Discards progress events.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}
