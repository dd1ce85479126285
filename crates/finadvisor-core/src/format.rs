//! Turn agent payloads into display text
//!
//! Agents report either a structured `json_dict` with a `message` field, a
//! `raw` string that may itself be JSON, or only a `summary`. Everything here
//! is pure.

use serde_json::{Map, Value};

use crate::jobs::AgentMessage;

/// Nesting levels flattened into indented lines before falling back to
/// compact JSON
pub const MAX_FLATTEN_DEPTH: usize = 16;

const INDENT: &str = "  ";

/// Text for one message in the running agent conversation.
pub fn format_agent_message(message: &AgentMessage) -> String {
    if let Some(value) = structured_message(message) {
        return render_message_value(value);
    }
    if !message.raw.is_empty() {
        return match serde_json::from_str::<Value>(&message.raw) {
            Ok(parsed) => parsed
                .get("message")
                .filter(|v| is_truthy(v))
                .map(render_message_value)
                .unwrap_or_else(|| message.summary.clone()),
            Err(_) => message.summary.clone(),
        };
    }
    message.summary.clone()
}

/// Text shown as the job's answer once the backend reports completion.
///
/// Unlike [`format_agent_message`], an unparsable `raw` is shown verbatim:
/// the last agent usually writes plain prose there.
pub fn final_output(message: &AgentMessage) -> String {
    if let Some(value) = structured_message(message) {
        return render_message_value(value);
    }
    if !message.raw.is_empty() {
        return match serde_json::from_str::<Value>(&message.raw) {
            Ok(parsed) => parsed
                .get("message")
                .filter(|v| is_truthy(v))
                .map(render_message_value)
                .unwrap_or_else(|| "Processing complete".to_string()),
            Err(_) => message.raw.clone(),
        };
    }
    message.summary.clone()
}

/// Render a `message` value: text as-is, objects flattened to `key: value`
/// lines, arrays comma-joined.
pub fn render_message_value(value: &Value) -> String {
    match value {
        Value::Object(map) => flatten_object(map),
        Value::Array(items) => join_array(items),
        other => scalar(other),
    }
}

/// Flatten an object into indented `key: value` lines.
pub fn flatten_object(map: &Map<String, Value>) -> String {
    let mut lines = Vec::new();
    flatten_into(&mut lines, map, 0, 0);
    lines.join("\n").trim().to_string()
}

fn flatten_into(lines: &mut Vec<String>, map: &Map<String, Value>, indent: usize, depth: usize) {
    let pad = INDENT.repeat(indent);
    for (key, value) in map {
        match value {
            Value::Object(inner) if depth < MAX_FLATTEN_DEPTH => {
                lines.push(format!("{}{}:", pad, key));
                flatten_into(lines, inner, indent + 1, depth + 1);
            }
            Value::Object(_) => lines.push(format!("{}{}: {}", pad, key, value)),
            Value::Array(items) => lines.push(format!("{}{}: {}", pad, key, join_array(items))),
            other => lines.push(format!("{}{}: {}", pad, key, scalar(other))),
        }
    }
}

fn join_array(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Object(_) | Value::Array(_) => item.to_string(),
            other => scalar(other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn structured_message(message: &AgentMessage) -> Option<&Value> {
    message
        .json_dict
        .as_ref()
        .and_then(|payload| payload.get("message"))
        .filter(|v| is_truthy(v))
}

// Agents emit `"message": ""` or `null` when they have nothing to say
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
