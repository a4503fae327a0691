//! Best-effort coercion of model output into syntactically valid JSON.

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````) if present.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Return `text` as valid JSON.
///
/// Order of attempts: the fence-stripped text as-is, then the span from the first `{`
/// to the last `}`, then `{"response": text}`.
#[must_use]
pub fn coerce_json(text: &str) -> String {
    let stripped = strip_fences(text);
    if serde_json::from_str::<serde_json::Value>(stripped).is_ok() {
        return stripped.to_owned();
    }
    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}'))
        && start < end
    {
        let candidate = &stripped[start..=end];
        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
            return candidate.to_owned();
        }
    }
    serde_json::json!({ "response": text }).to_string()
}

/// Sentinel returned in JSON mode when the provider failed outright.
#[must_use]
pub fn error_sentinel(message: &str) -> String {
    serde_json::json!({ "error": message, "is_valid": false }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> serde_json::Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn plain_json_passes_through() {
        assert_eq!(coerce_json(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let out = coerce_json("```json\n{\"questions\": [\"a\"]}\n```");
        assert_eq!(parse(&out)["questions"][0], "a");
    }

    #[test]
    fn embedded_object_is_extracted() {
        let out = coerce_json("Sure! Here you go: {\"indices\": [2, 0]} hope it helps");
        assert_eq!(parse(&out)["indices"][0], 2);
    }

    #[test]
    fn prose_is_wrapped() {
        let out = coerce_json("no json here");
        assert_eq!(parse(&out)["response"], "no json here");
    }

    #[test]
    fn broken_braces_are_wrapped() {
        let out = coerce_json("{ not: valid }");
        assert_eq!(parse(&out)["response"], "{ not: valid }");
    }

    #[test]
    fn sentinel_is_valid_json() {
        let v = parse(&error_sentinel("down"));
        assert_eq!(v["error"], "down");
        assert_eq!(v["is_valid"], false);
    }
}
