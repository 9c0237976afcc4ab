//! In-memory language model for unit tests.

use crate::domain::ports::{CompletionRequest, LanguageModel};
use crate::utils::error::{ReviewError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// Replies with the first scripted answer whose trigger occurs in the prompt;
/// prompts matching no trigger fail with an HTTP 500 style error.
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, trigger: &str, answer: &str) -> Self {
        self.rules.push((trigger.to_string(), answer.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        self.rules
            .iter()
            .find(|(trigger, _)| request.prompt.contains(trigger.as_str()))
            .map(|(_, answer)| answer.clone())
            .ok_or_else(|| ReviewError::LlmApiError {
                status: 500,
                message: "no scripted reply".to_string(),
            })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
