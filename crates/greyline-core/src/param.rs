//! Action parameter parsing.
//!
//! The framework hands actions an opaque value: absent, a plain string,
//! a JSON-encoded string, or an already-structured object. It is parsed
//! exactly once at the boundary into a tagged variant so handlers
//! pattern-match instead of re-deriving the shape.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{ChannelKind, MessageStyle};

/// Structured action parameter, as sent by pipeline definitions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredParam {
    /// Handling mode, e.g. "log" for local-only output.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Message template.
    #[serde(default)]
    pub message: Option<String>,
    /// Substitution map for the template.
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
    /// Message style for channels that distinguish (WeChat Work).
    #[serde(default)]
    pub msgtype: MessageStyle,
    /// Preferred channel override.
    #[serde(default)]
    pub platform: Option<ChannelKind>,
}

/// Tagged action parameter.
#[derive(Debug, Clone)]
pub enum ActionParam {
    /// No parameter supplied.
    None,
    /// A plain string, used as the message verbatim.
    Raw(String),
    /// A structured object.
    Structured(StructuredParam),
}

impl ActionParam {
    /// Parse the raw framework value.
    ///
    /// A string that itself decodes to a JSON object is treated as
    /// structured; any other JSON shape degrades to its string rendering.
    pub fn parse(raw: Option<&Value>) -> Self {
        let Some(value) = raw else {
            return ActionParam::None;
        };
        match value {
            Value::Null => ActionParam::None,
            Value::String(s) => {
                if s.is_empty() {
                    return ActionParam::None;
                }
                match serde_json::from_str::<Value>(s) {
                    Ok(Value::Object(map)) => Self::from_object(Value::Object(map)),
                    _ => ActionParam::Raw(s.clone()),
                }
            }
            Value::Object(_) => Self::from_object(value.clone()),
            other => ActionParam::Raw(other.to_string()),
        }
    }

    fn from_object(value: Value) -> Self {
        match serde_json::from_value::<StructuredParam>(value) {
            Ok(p) => ActionParam::Structured(p),
            Err(e) => {
                tracing::warn!("malformed structured parameter: {e}");
                ActionParam::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_is_none() {
        assert!(matches!(ActionParam::parse(None), ActionParam::None));
        assert!(matches!(
            ActionParam::parse(Some(&Value::Null)),
            ActionParam::None
        ));
        assert!(matches!(
            ActionParam::parse(Some(&json!(""))),
            ActionParam::None
        ));
    }

    #[test]
    fn test_plain_string_is_raw() {
        let p = ActionParam::parse(Some(&json!("task finished")));
        match p {
            ActionParam::Raw(s) => assert_eq!(s, "task finished"),
            other => panic!("expected Raw, got {other:?}"),
        }
    }

    #[test]
    fn test_json_encoded_string_is_structured() {
        let encoded = json!(r#"{"type":"notify","message":"done","platform":"telegram"}"#);
        let p = ActionParam::parse(Some(&encoded));
        match p {
            ActionParam::Structured(s) => {
                assert_eq!(s.kind.as_deref(), Some("notify"));
                assert_eq!(s.message.as_deref(), Some("done"));
                assert_eq!(s.platform, Some(ChannelKind::Telegram));
            }
            other => panic!("expected Structured, got {other:?}"),
        }
    }

    #[test]
    fn test_object_is_structured() {
        let value = json!({
            "message": "Count={c}",
            "parameters": {"c": "{Task_Counter}"},
            "msgtype": "markdown"
        });
        let p = ActionParam::parse(Some(&value));
        match p {
            ActionParam::Structured(s) => {
                assert_eq!(s.msgtype, MessageStyle::Markdown);
                assert_eq!(s.parameters.len(), 1);
                assert_eq!(s.kind, None);
            }
            other => panic!("expected Structured, got {other:?}"),
        }
    }

    #[test]
    fn test_other_shapes_degrade_to_raw() {
        let p = ActionParam::parse(Some(&json!(42)));
        match p {
            ActionParam::Raw(s) => assert_eq!(s, "42"),
            other => panic!("expected Raw, got {other:?}"),
        }
    }
}
