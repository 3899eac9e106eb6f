//! Flattening `tools/call` results into text.

use serde_json::Value;

/// Render a tool result as a single string.
///
/// A `content` array becomes one line per part: a part's non-empty `text`,
/// otherwise the part's JSON. Anything else is returned as-is if it is a
/// string and as compact JSON otherwise.
pub fn normalize_tool_result(result: &Value) -> String {
    if let Some(parts) = result.get("content").and_then(Value::as_array) {
        return parts.iter().map(render_part).collect::<Vec<_>>().join("\n");
    }
    match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_part(part: &Value) -> String {
    match part.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => part.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_parts_joined_by_newline() {
        let out = normalize_tool_result(&json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ]
        }));
        assert_eq!(out, "first\nsecond");
    }

    #[test]
    fn non_text_parts_serialized() {
        let out = normalize_tool_result(&json!({
            "content": [
                {"type": "image", "data": "AAA", "mimeType": "image/png"},
                {"type": "text", "text": ""}
            ]
        }));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let image: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(image["mimeType"], "image/png");
        assert_eq!(lines[1], r#"{"text":"","type":"text"}"#);
    }

    #[test]
    fn bare_string_and_object() {
        assert_eq!(normalize_tool_result(&json!("plain")), "plain");
        assert_eq!(normalize_tool_result(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(normalize_tool_result(&Value::Null), "null");
    }

    #[test]
    fn empty_content_is_empty_string() {
        assert_eq!(normalize_tool_result(&json!({"content": []})), "");
    }
}
