//! Layered recovery of a JSON document from free-form model output.
//!
//! Stages, each tried only when the previous one failed:
//! 1. strip a surrounding code fence and parse,
//! 2. parse the span from the first `{` to the last `}`,
//! 3. parse that span after [`repair::apply_all`].

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::parse_debug::{ParseDebugSink, ParseFailure};
use super::repair;
use crate::error::ParseError;
use crate::types::GeneratedDocument;

const FENCE: &str = "```";

#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    debug_sink: Option<Arc<dyn ParseDebugSink>>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn ParseDebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    /// Recover a JSON value from `raw`.
    pub fn parse_value(&self, raw: &str) -> Result<Value, ParseError> {
        let cleaned = strip_code_fence(raw);
        let direct_error = match serde_json::from_str::<Value>(cleaned) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(extracted) = extract_object(cleaned) else {
            let detail = format!("no JSON object found ({direct_error})");
            self.report(ParseFailure {
                raw,
                cleaned,
                extracted: None,
                repaired: None,
                error: &detail,
            });
            return Err(ParseError::new(detail, raw));
        };

        if let Ok(value) = serde_json::from_str::<Value>(extracted) {
            debug!(target: "planner::parser", "parsed embedded object");
            return Ok(value);
        }

        let repaired = repair::apply_all(extracted);
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => {
                debug!(target: "planner::parser", "parsed after textual repair");
                Ok(value)
            }
            Err(err) => {
                let detail = err.to_string();
                self.report(ParseFailure {
                    raw,
                    cleaned,
                    extracted: Some(extracted),
                    repaired: Some(&repaired),
                    error: &detail,
                });
                Err(ParseError::new(detail, raw))
            }
        }
    }

    /// Recover and decode a [`GeneratedDocument`] from `raw`.
    pub fn parse(&self, raw: &str) -> Result<GeneratedDocument, ParseError> {
        let value = self.parse_value(raw)?;
        GeneratedDocument::from_value(&value, raw).map_err(|err| {
            warn!(target: "planner::parser", detail = %err.detail, "parsed JSON is not an itinerary");
            err
        })
    }

    fn report(&self, failure: ParseFailure<'_>) {
        warn!(
            target: "planner::parser",
            error = failure.error,
            preview = %crate::error::preview(failure.raw),
            "could not recover JSON from model output"
        );
        if let Some(sink) = &self.debug_sink {
            sink.record(&failure);
        }
    }
}

/// Trim whitespace and one surrounding code fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        body = &rest[tag_len..];
    }
    if let Some(rest) = body.trim_end().strip_suffix(FENCE) {
        body = rest;
    }
    body.trim()
}

/// Span from the first `{` to the last `}` inclusive.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// A response that does not end in `}` once fences are removed was most likely cut off.
pub fn looks_truncated(raw: &str) -> bool {
    !strip_code_fence(raw).ends_with('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        errors: Mutex<Vec<String>>,
    }

    impl ParseDebugSink for RecordingSink {
        fn record(&self, failure: &ParseFailure<'_>) {
            self.errors.lock().unwrap().push(failure.error.to_string());
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_trailing_separator_is_repaired() {
        let value = ResponseParser::new().parse_value(r#"{"a":1,}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_repair_keeps_string_contents() {
        let value = ResponseParser::new()
            .parse_value(r#"{"tip": "pack [A] [B]", "a": 1,}"#)
            .unwrap();
        assert_eq!(value, json!({"tip": "pack [A] [B]", "a": 1}));
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Sure! Here is your plan:\n{\"a\":1}\nHave a great trip.";
        let value = ResponseParser::new().parse_value(raw).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_object_inside_prose() {
        let raw = "Plan below\n```json\n{\"a\": [1, 2,]}\n```\nthanks";
        let value = ResponseParser::new().parse_value(raw).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_no_braces_fails_with_bounded_error() {
        let raw = "I'm sorry, I cannot help with that. ".repeat(40);
        let sink = Arc::new(RecordingSink::default());
        let parser = ResponseParser::new().with_debug_sink(sink.clone());

        let err = parser.parse_value(&raw).unwrap_err();
        assert!(err.detail.contains("no JSON object"));
        assert_eq!(err.preview.chars().count(), crate::error::PREVIEW_CHARS);
        assert!(err.to_string().len() < raw.len());
        assert_eq!(sink.errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unescaped_quotes_are_not_repaired() {
        let raw = r#"{"tip": "say "hi" politely"}"#;
        assert!(ResponseParser::new().parse_value(raw).is_err());
    }

    #[test]
    fn test_truncation_signal() {
        assert!(looks_truncated(r#"{"destination": "Rome", "itinerary": ["#));
        assert!(!looks_truncated("```json\n{\"a\":1}\n```"));
        assert!(!looks_truncated("{\"a\":1}\n"));
    }
}
