use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output tokens assumed when the provider reports no usage.
pub const DEFAULT_ESTIMATED_OUTPUT_TOKENS: u32 = 2000;
const CHARS_PER_TOKEN: usize = 4;

/// Token usage information for one model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Set when the counts were approximated rather than reported by the provider
    #[serde(default)]
    pub estimated: bool,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            estimated: false,
        }
    }

    /// Rough usage for a prompt whose response carried no usage metadata.
    pub fn estimate(prompt: &str) -> Self {
        let prompt_tokens = u32::try_from(prompt.len() / CHARS_PER_TOKEN).unwrap_or(u32::MAX);
        Self {
            estimated: true,
            ..Self::new(prompt_tokens, DEFAULT_ESTIMATED_OUTPUT_TOKENS)
        }
    }

    /// Read an OpenAI-style `usage` object.
    pub fn from_openai(usage: &Value) -> Option<Self> {
        let prompt_tokens = usage.get("prompt_tokens")?.as_u64()? as u32;
        let completion_tokens = usage.get("completion_tokens")?.as_u64()? as u32;
        let mut parsed = Self::new(prompt_tokens, completion_tokens);
        if let Some(total) = usage.get("total_tokens").and_then(Value::as_u64) {
            parsed.total_tokens = total as u32;
        }
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_estimate_flags_approximation() {
        let usage = TokenUsage::estimate(&"x".repeat(400));
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, DEFAULT_ESTIMATED_OUTPUT_TOKENS);
        assert_eq!(usage.total_tokens, 100 + DEFAULT_ESTIMATED_OUTPUT_TOKENS);
        assert!(usage.estimated);
    }

    #[test]
    fn test_from_openai_usage() {
        let usage = TokenUsage::from_openai(&json!({
            "prompt_tokens": 120,
            "completion_tokens": 900,
            "total_tokens": 1020
        }))
        .unwrap();
        assert_eq!(usage.total_tokens, 1020);
        assert!(!usage.estimated);
        assert!(TokenUsage::from_openai(&json!({"prompt_tokens": 1})).is_none());
    }
}
