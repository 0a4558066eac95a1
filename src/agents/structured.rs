use serde_json::Value;

/// Best-effort extraction of a JSON object or array from a model reply.
///
/// Accepts bare JSON, JSON inside a fenced code block, or JSON embedded in
/// surrounding prose. Scalars are not treated as structured data. Never
/// fails; anything unparseable yields `None`.
pub fn try_parse_structured(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    parse_container(trimmed)
        .or_else(|| strip_code_fence(trimmed).and_then(parse_container))
        .or_else(|| embedded_span(trimmed).and_then(parse_container))
}

fn parse_container(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    // Skip the info string (e.g. "json") up to the first newline.
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn embedded_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    (end > start).then(|| &text[start..=end])
}
