//! The action vocabulary shared by the model, the workflow and the tools.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sherpa_llm::decode::{decode_value, DecodeError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Type,
    Click,
    Extract,
    Finish,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Navigate,
        ActionKind::Type,
        ActionKind::Click,
        ActionKind::Extract,
        ActionKind::Finish,
    ];

    /// Preference order when an out-of-vocabulary action must be replaced.
    pub const SUBSTITUTES: [ActionKind; 4] = [
        ActionKind::Type,
        ActionKind::Click,
        ActionKind::Extract,
        ActionKind::Finish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Type => "type",
            ActionKind::Click => "click",
            ActionKind::Extract => "extract",
            ActionKind::Finish => "finish",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{action}` needs a non-empty `{field}`")]
    MissingField {
        action: ActionKind,
        field: &'static str,
    },
    #[error("`{action}.{field}` must be {expected}")]
    WrongType {
        action: ActionKind,
        field: &'static str,
        expected: &'static str,
    },
    #[error("`{0}` arguments must be a JSON object")]
    NotAnObject(ActionKind),
}

/// A validated action ready for a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    Navigate { url: String },
    Type { selector: String, text: String },
    Click { selector: String },
    Extract { selector: String, index: usize },
    Finish,
}

impl AgentAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            AgentAction::Navigate { .. } => ActionKind::Navigate,
            AgentAction::Type { .. } => ActionKind::Type,
            AgentAction::Click { .. } => ActionKind::Click,
            AgentAction::Extract { .. } => ActionKind::Extract,
            AgentAction::Finish => ActionKind::Finish,
        }
    }

    /// Validate `args` for `kind`. String values are taken as given, without
    /// trimming or rewriting.
    pub fn from_parts(kind: ActionKind, args: &Value) -> Result<Self, ValidationError> {
        let args = coerce_arguments(kind, args.clone());
        if kind == ActionKind::Finish {
            return Ok(AgentAction::Finish);
        }
        let obj = args.as_object().ok_or(ValidationError::NotAnObject(kind))?;

        Ok(match kind {
            ActionKind::Navigate => AgentAction::Navigate {
                url: required_str(obj, kind, "url")?,
            },
            ActionKind::Type => AgentAction::Type {
                selector: required_str(obj, kind, "selector")?,
                text: required_str(obj, kind, "text")?,
            },
            ActionKind::Click => AgentAction::Click {
                selector: required_str(obj, kind, "selector")?,
            },
            ActionKind::Extract => AgentAction::Extract {
                selector: required_str(obj, kind, "selector")?,
                index: optional_index(obj, kind)?,
            },
            ActionKind::Finish => AgentAction::Finish,
        })
    }
}

/// The only argument rewrite: `navigate` given a bare string becomes `{url}`.
pub fn coerce_arguments(kind: ActionKind, args: Value) -> Value {
    match (kind, args) {
        (ActionKind::Navigate, Value::String(url)) => {
            let mut obj = Map::new();
            obj.insert("url".to_string(), Value::String(url));
            Value::Object(obj)
        }
        (_, other) => other,
    }
}

fn required_str(
    obj: &Map<String, Value>,
    action: ActionKind,
    field: &'static str,
) -> Result<String, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { action, field }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ValidationError::MissingField { action, field })
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::WrongType {
            action,
            field,
            expected: "a string",
        }),
    }
}

fn optional_index(obj: &Map<String, Value>, action: ActionKind) -> Result<usize, ValidationError> {
    match obj.get("index") {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or(ValidationError::WrongType {
                action,
                field: "index",
                expected: "a non-negative integer",
            }),
    }
}

/// The model's reply before the action tag is checked against a vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDecision {
    pub action: String,
    pub arguments: Value,
    pub format: Option<String>,
}

impl RawDecision {
    /// Decode `{"action": "...", "arguments": {...}}` out of free text.
    pub fn from_reply(text: &str) -> Result<Self, DecodeError> {
        let value = decode_value(text)?;
        let obj = value
            .as_object()
            .ok_or_else(|| DecodeError::Shape("expected a JSON object".into()))?;
        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::Shape("missing string field `action`".into()))?;
        Ok(Self {
            action: action.to_string(),
            arguments: obj
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            format: obj.get("format").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// An action the workflow decided on but has not executed yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub arguments: Value,
}

/// Entry of `actions_taken`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: ActionKind,
    pub arguments: Value,
}

/// Entry of the audit trail returned at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub tool: String,
    pub action: ActionKind,
    pub arguments: Value,
    pub result: String,
    /// Output format the model asked for when it chose an extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ActionKind::parse(" Navigate "), Some(ActionKind::Navigate));
        assert_eq!(ActionKind::parse("search"), None);
    }

    #[test]
    fn valid_arguments_pass_through_unchanged() {
        let args = json!({"selector": "  #q ", "text": "rust lang"});
        let action = AgentAction::from_parts(ActionKind::Type, &args).unwrap();
        assert_eq!(
            action,
            AgentAction::Type {
                selector: "  #q ".into(),
                text: "rust lang".into()
            }
        );
    }

    #[test]
    fn navigate_accepts_bare_string() {
        let action =
            AgentAction::from_parts(ActionKind::Navigate, &json!("https://example.com")).unwrap();
        assert_eq!(
            action,
            AgentAction::Navigate {
                url: "https://example.com".into()
            }
        );
        assert_eq!(
            coerce_arguments(ActionKind::Navigate, json!("u")),
            json!({"url": "u"})
        );
        assert_eq!(coerce_arguments(ActionKind::Click, json!("u")), json!("u"));
    }

    #[test]
    fn missing_and_blank_fields_are_rejected() {
        let err = AgentAction::from_parts(ActionKind::Type, &json!({"selector": "#q"})).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                action: ActionKind::Type,
                field: "text"
            }
        );
        assert!(AgentAction::from_parts(ActionKind::Click, &json!({"selector": "  "})).is_err());
        assert!(AgentAction::from_parts(ActionKind::Extract, &json!({})).is_err());
        assert!(AgentAction::from_parts(ActionKind::Click, &json!("#btn")).is_err());
    }

    #[test]
    fn extract_index_defaults_to_zero() {
        let a = AgentAction::from_parts(ActionKind::Extract, &json!({"selector": "h1"})).unwrap();
        assert_eq!(a, AgentAction::Extract { selector: "h1".into(), index: 0 });
        let b = AgentAction::from_parts(ActionKind::Extract, &json!({"selector": "li", "index": 2}))
            .unwrap();
        assert_eq!(b, AgentAction::Extract { selector: "li".into(), index: 2 });
        assert!(
            AgentAction::from_parts(ActionKind::Extract, &json!({"selector": "li", "index": -1}))
                .is_err()
        );
    }

    #[test]
    fn finish_ignores_arguments() {
        assert_eq!(
            AgentAction::from_parts(ActionKind::Finish, &json!(null)).unwrap(),
            AgentAction::Finish
        );
    }

    #[test]
    fn decision_is_decoded_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"action\": \"click\", \"arguments\": {\"selector\": \"a\"}}\n```";
        let d = RawDecision::from_reply(reply).unwrap();
        assert_eq!(d.action, "click");
        assert_eq!(d.arguments, json!({"selector": "a"}));
        assert_eq!(d.format, None);
    }

    #[test]
    fn decision_without_arguments_gets_empty_object() {
        let d = RawDecision::from_reply(r#"{"action":"finish"}"#).unwrap();
        assert_eq!(d.arguments, json!({}));
    }

    #[test]
    fn decision_shape_errors() {
        assert!(matches!(
            RawDecision::from_reply(r#"{"arguments":{}}"#),
            Err(DecodeError::Shape(_))
        ));
        assert!(matches!(
            RawDecision::from_reply("[1,2]"),
            Err(DecodeError::Shape(_))
        ));
        assert_eq!(RawDecision::from_reply(""), Err(DecodeError::Empty));
    }
}
