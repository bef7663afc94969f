//! Message templating.
//!
//! Templates use `{name}` placeholders filled from a parameter map.
//! Two parameter *values* are dynamic: `"{Task_Counter}"` reads the shared
//! counter, `"{increment_Task_Counter}"` advances it and embeds the new
//! value. The advance is observable even when formatting later falls back.

use serde_json::{Map, Value};

use crate::counter::TaskCounter;

const COUNTER_READ: &str = "{Task_Counter}";
const COUNTER_INCREMENT: &str = "{increment_Task_Counter}";

/// Render a template against a parameter map.
///
/// Missing placeholder keys make formatting fall back to returning the
/// unformatted template verbatim; this never fails or panics.
pub fn render(template: &str, parameters: &Map<String, Value>, counter: &TaskCounter) -> String {
    // Resolve dynamic values first so counter side effects always apply.
    let mut resolved: Map<String, Value> = Map::with_capacity(parameters.len());
    for (key, value) in parameters {
        let value = match value {
            Value::String(s) if s == COUNTER_READ => Value::from(counter.get()),
            Value::String(s) if s == COUNTER_INCREMENT => Value::from(counter.increment()),
            other => other.clone(),
        };
        resolved.insert(key.clone(), value);
    }

    let Some(rendered) = substitute(template, &resolved) else {
        tracing::debug!("template references a missing key, returning it unformatted");
        return template.to_string();
    };
    rendered
}

/// Keyed substitution. Returns None when the template references a key
/// absent from the map.
fn substitute(template: &str, parameters: &Map<String, Value>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            // Unterminated brace: emit literally.
            out.push_str(&rest[open..]);
            return Some(out);
        };
        let name = &after[..close];
        match parameters.get(name) {
            Some(value) => out.push_str(&value_text(value)),
            None => return None,
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
