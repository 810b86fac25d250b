use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::types::TokenUsage;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Ask the provider for a single JSON object
    pub json_object: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            top_p: 0.95,
            max_output_tokens: 8192,
            json_object: true,
        }
    }
}

/// Text returned by a model plus whatever usage it reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A generative model that turns a prompt into text.
#[async_trait]
pub trait CompletionModel: Send + Sync + fmt::Debug {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<ModelResponse>;
}
