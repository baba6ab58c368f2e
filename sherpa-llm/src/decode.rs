//! Recover JSON payloads from free-text model replies.
//!
//! Models wrap JSON in markdown fences, prepend prose, or append commentary.
//! Decoding is a dedicated step with a typed outcome: the caller always learns
//! *why* a reply was rejected and decides itself whether a fallback applies.
//! Nothing here substitutes defaults.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("model reply was empty")]
    Empty,
    #[error("no JSON object or array found in model reply")]
    NoJson,
    #[error("invalid JSON in model reply: {0}")]
    Malformed(String),
    #[error("model JSON did not match the expected shape: {0}")]
    Shape(String),
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence regex compiles")
    })
}

/// Return the body of the first fenced block, or the trimmed input when the
/// reply carries no fence.
///
/// ```
/// use sherpa_llm::decode::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// assert_eq!(strip_code_fences("  plain  "), "plain");
/// ```
pub fn strip_code_fences(text: &str) -> &str {
    match fence_re().captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

/// Slice from the first opening bracket to the last matching closing bracket.
///
/// Whichever of `{` / `[` appears first decides the payload kind. The slice is
/// not validated; text holding two separate objects yields one slice spanning
/// both, which then fails to parse.
pub fn locate_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a reply into an untyped JSON value.
pub fn decode_value(text: &str) -> Result<Value, DecodeError> {
    if text.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    let body = strip_code_fences(text);
    let slice = locate_json(body).ok_or(DecodeError::NoJson)?;
    serde_json::from_str(slice).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Decode a reply into `T`.
///
/// ```
/// use serde::Deserialize;
/// use sherpa_llm::decode::decode_json;
///
/// #[derive(Deserialize)]
/// struct Plan { steps: Vec<String> }
///
/// let plan: Plan = decode_json("Sure!\n```json\n{\"steps\":[\"search\"]}\n```").unwrap();
/// assert_eq!(plan.steps, vec!["search"]);
/// ```
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let value = decode_value(text)?;
    serde_json::from_value(value).map_err(|e| DecodeError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pick {
        action: String,
    }

    #[test]
    fn bare_json_decodes() {
        assert_eq!(decode_value(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fenced_json_with_prose_decodes() {
        let reply = "Here you go:\n```json\n{\"action\": \"finish\"}\n```\nGood luck!";
        let pick: Pick = decode_json(reply).unwrap();
        assert_eq!(pick.action, "finish");
    }

    #[test]
    fn unlabelled_fence_decodes() {
        let reply = "```\n[1, 2, 3]\n```";
        assert_eq!(decode_value(reply).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn prose_around_unfenced_object_is_ignored() {
        let reply = "I think {\"action\": \"click\"} is best.";
        let pick: Pick = decode_json(reply).unwrap();
        assert_eq!(pick.action, "click");
    }

    #[test]
    fn array_of_objects_keeps_outer_brackets() {
        let reply = "results: [{\"url\": \"a\"}, {\"url\": \"b\"}]";
        let value = decode_value(reply).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn empty_reply_is_reported() {
        assert_eq!(decode_value("   "), Err(DecodeError::Empty));
    }

    #[test]
    fn reply_without_brackets_is_reported() {
        assert_eq!(decode_value("yes, done"), Err(DecodeError::NoJson));
    }

    #[test]
    fn closing_before_opening_is_not_json() {
        assert_eq!(locate_json("} oops {"), None);
    }

    // Two sibling objects are ambiguous: the decoder refuses instead of
    // guessing which one the model meant.
    #[test]
    fn two_sibling_objects_are_rejected_not_guessed() {
        let reply = r#"{"action": "click"} or maybe {"action": "finish"}"#;
        assert!(matches!(decode_value(reply), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn wrong_shape_is_distinguished_from_bad_json() {
        let err = decode_json::<Pick>(r#"{"verb": "click"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }
}
