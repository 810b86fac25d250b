use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::model::{CompletionModel, GenerationParams, ModelResponse};
use crate::error::{PlannerError, Result};
use crate::types::TokenUsage;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
const DEFAULT_HTTP_RETRIES: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for OpenAI-compatible chat-completion endpoints.
#[derive(Clone, Debug)]
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    max_http_retries: usize,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_http_retries: DEFAULT_HTTP_RETRIES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transport-level retries for 429 and 5xx responses.
    pub fn with_max_http_retries(mut self, retries: usize) -> Self {
        self.max_http_retries = retries;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat_completion(&self, body: &Value) -> Result<Value> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| PlannerError::Http(format!("Failed to build HTTP client: {err}")))?;

        let mut attempt = 0;
        let mut backoff = Duration::from_millis(250);
        let request_url = build_chat_url(&self.base_url);

        loop {
            let response = client
                .post(&request_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .header("X-Title", "trip-planner-rs")
                .json(body)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        PlannerError::Timeout(format!("chat completion timed out: {err}"))
                    } else {
                        PlannerError::Http(format!("HTTP request failed: {err}"))
                    }
                })?;

            let status = response.status();
            let headers = response.headers().clone();
            let response_text = response
                .text()
                .await
                .map_err(|err| PlannerError::Http(format!("Failed to read response: {err}")))?;

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_duration = headers
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff);

                if attempt < self.max_http_retries {
                    warn!(target: "planner::model", attempt, "rate limited, backing off");
                    tokio::time::sleep(retry_after_duration).await;
                    attempt += 1;
                    backoff *= 2;
                    continue;
                }

                return Err(PlannerError::RateLimit {
                    retry_after: retry_after_duration.as_secs().max(1),
                });
            }

            if status.is_server_error() && attempt < self.max_http_retries {
                warn!(target: "planner::model", attempt, %status, "server error, backing off");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                backoff *= 2;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(PlannerError::Config(format!(
                    "model provider rejected the credentials (HTTP {status})"
                )));
            }

            let response_json: Value = serde_json::from_str(&response_text)
                .map_err(|err| PlannerError::Http(format!("Failed to parse JSON: {err}")))?;

            if !status.is_success() {
                let api_message = response_json
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or(response_text.clone());

                return Err(PlannerError::Http(format!(
                    "HTTP {} error: {}",
                    status, api_message
                )));
            }

            if let Some(error) = response_json.get("error") {
                let error_message = error
                    .get("message")
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| error.to_string());
                return Err(PlannerError::Http(format!("API error: {}", error_message)));
            }

            return Ok(response_json);
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAIClient {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<ModelResponse> {
        let messages = vec![json!({
            "role": "user",
            "content": prompt
        })];
        let body = ChatCompletionRequest::new(self.model.clone(), messages)
            .with_params(params)
            .into_value();

        let response = self.chat_completion(&body).await?;
        let text = extract_message_text(&response)?;
        let usage = response.get("usage").and_then(TokenUsage::from_openai);

        debug!(
            target: "planner::model",
            model = %self.model,
            chars = text.len(),
            reported_usage = usage.is_some(),
            "chat completion received"
        );

        Ok(ModelResponse { text, usage })
    }
}

/// Concatenate the assistant text of the first choice.
fn extract_message_text(response: &Value) -> Result<String> {
    let choices = response
        .get("choices")
        .and_then(|value| value.as_array())
        .ok_or_else(|| {
            PlannerError::Http("Missing 'choices' array in completion response".to_string())
        })?;

    let first_choice = choices.first().ok_or_else(|| {
        PlannerError::Http("Completion response contained no choices".to_string())
    })?;

    let content = first_choice
        .get("message")
        .and_then(|message| message.get("content"))
        .ok_or_else(|| {
            PlannerError::Http("Completion response missing assistant message".to_string())
        })?;

    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(PlannerError::Http("Empty response from model".to_string()));
    }
    Ok(text)
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

#[derive(Clone, Debug)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    response_format: Option<Value>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            response_format: None,
        }
    }

    pub fn with_params(mut self, params: &GenerationParams) -> Self {
        self.temperature = Some(params.temperature);
        self.top_p = Some(params.top_p);
        self.max_tokens = Some(params.max_output_tokens);
        if params.json_object {
            self.response_format = Some(json!({ "type": "json_object" }));
        }
        self
    }

    pub fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(top_p) = self.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(response_format) = self.response_format {
            body["response_format"] = response_format;
        }

        body
    }
}
