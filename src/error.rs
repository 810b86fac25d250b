use thiserror::Error;

/// Longest slice of raw model output carried inside a [`ParseError`].
pub const PREVIEW_CHARS: usize = 300;

/// Main error type for the planner
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Model response looks truncated ({length} chars, no closing brace)")]
    Truncated { length: usize },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Weather lookup failed: {0}")]
    Weather(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A model response that could not be recovered into a document.
///
/// Only a bounded preview of the raw text is kept so error messages stay small.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to parse model response: {detail} (preview: {preview:?})")]
pub struct ParseError {
    pub detail: String,
    pub preview: String,
}

impl ParseError {
    pub fn new(detail: impl Into<String>, raw: &str) -> Self {
        Self {
            detail: detail.into(),
            preview: preview(raw),
        }
    }
}

/// First [`PREVIEW_CHARS`] characters of `raw`.
pub fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PlannerError::Config(_) | PlannerError::InvalidRequest(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PlannerError::Config(_) => "CONFIG_ERROR",
            PlannerError::InvalidRequest(_) => "INVALID_REQUEST",
            PlannerError::Http(_) => "HTTP_ERROR",
            PlannerError::Serialization(_) => "SERIALIZATION_ERROR",
            PlannerError::Parse(_) => "PARSE_ERROR",
            PlannerError::Truncated { .. } => "TRUNCATED_RESPONSE",
            PlannerError::Timeout(_) => "TIMEOUT_ERROR",
            PlannerError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            PlannerError::Weather(_) => "WEATHER_ERROR",
            PlannerError::Io(_) => "IO_ERROR",
            PlannerError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        })
    }
}
