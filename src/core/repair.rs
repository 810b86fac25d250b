//! Last-resort textual repairs for almost-JSON model output.
//!
//! Each rule is a pure `&str -> Cow<str>` transform so it can be tested and
//! reordered on its own. String literals are matched first and copied through
//! untouched, so no rule rewrites text inside a value. Unescaped quotes are
//! left alone.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

pub type Repair = fn(&str) -> Cow<'_, str>;

/// Rules in application order.
pub const REPAIRS: &[(&str, Repair)] = &[
    ("trailing_separator", remove_trailing_separators),
    ("missing_separator", insert_missing_separators),
];

fn trailing_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)(?P<string>"(?:[^"\\]|\\.)*")|,\s*(?P<close>[}\]])"#)
            .expect("trailing separator pattern")
    })
}

fn adjacent_containers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)(?P<string>"(?:[^"\\]|\\.)*")|(?P<close>[}\]])(?P<space>\s*)(?P<open>[{\[])"#,
        )
        .expect("adjacent container pattern")
    })
}

/// Apply `rewrite` to every structural match, copying string literals verbatim.
fn rewrite_outside_strings<'t>(
    pattern: &Regex,
    text: &'t str,
    rewrite: impl Fn(&Captures<'_>) -> String,
) -> Cow<'t, str> {
    let mut output = String::new();
    let mut copied_to = 0;
    for captures in pattern.captures_iter(text) {
        if captures.name("string").is_some() {
            continue;
        }
        let Some(whole) = captures.get(0) else {
            continue;
        };
        output.push_str(&text[copied_to..whole.start()]);
        output.push_str(&rewrite(&captures));
        copied_to = whole.end();
    }

    if copied_to == 0 {
        return Cow::Borrowed(text);
    }
    output.push_str(&text[copied_to..]);
    Cow::Owned(output)
}

fn group<'c>(captures: &'c Captures<'_>, name: &str) -> &'c str {
    captures.name(name).map_or("", |found| found.as_str())
}

/// `{"a": 1,}` => `{"a": 1}`, `[1, 2, ]` => `[1, 2]`
pub fn remove_trailing_separators(text: &str) -> Cow<'_, str> {
    rewrite_outside_strings(trailing_separator(), text, |captures| {
        group(captures, "close").to_string()
    })
}

/// `{"a": 1}{"b": 2}` => `{"a": 1},{"b": 2}`
pub fn insert_missing_separators(text: &str) -> Cow<'_, str> {
    rewrite_outside_strings(adjacent_containers(), text, |captures| {
        format!(
            "{},{}{}",
            group(captures, "close"),
            group(captures, "space"),
            group(captures, "open")
        )
    })
}

/// Run every rule over `text`.
pub fn apply_all(text: &str) -> String {
    REPAIRS
        .iter()
        .fold(text.to_string(), |current, (_, repair)| {
            repair(&current).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_separators() {
        assert_eq!(remove_trailing_separators(r#"{"a":1,}"#), r#"{"a":1}"#);
        assert_eq!(remove_trailing_separators("[1, 2,\n  ]"), "[1, 2]");
        assert!(matches!(
            remove_trailing_separators(r#"{"a":[1,2]}"#),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_missing_separators() {
        assert_eq!(
            insert_missing_separators(r#"[{"a":1}{"b":2}]"#),
            r#"[{"a":1},{"b":2}]"#
        );
        assert_eq!(
            insert_missing_separators("[[1]\n  [2]]"),
            "[[1],\n  [2]]"
        );
        assert_eq!(insert_missing_separators(r#"{"a":[1]}"#), r#"{"a":[1]}"#);
    }

    #[test]
    fn test_apply_all_combines_rules() {
        let repaired = apply_all(r#"{"days":[{"day":1,}{"day":2}],}"#);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["days"][1]["day"], 2);
    }

    #[test]
    fn test_string_values_survive_repairs() {
        let repaired = apply_all(r#"{"tip": "pack [A] [B], {x,}", "a": 1,}"#);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["tip"], "pack [A] [B], {x,}");
        assert_eq!(value["a"], 1);

        let escaped = r#"["say \"hi\" ]{", 1,]"#;
        assert_eq!(remove_trailing_separators(escaped), r#"["say \"hi\" ]{", 1]"#);
        assert!(matches!(
            insert_missing_separators(r#"{"a": "] ["}"#),
            Cow::Borrowed(_)
        ));
    }
}
