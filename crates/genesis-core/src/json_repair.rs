//! Repair pass for almost-valid JSON from LLM output.
//!
//! Structured agent payloads routinely arrive wrapped in markdown
//! fences, with trailing commas, or truncated mid-object. This module
//! fixes those specific modes before handing the string to
//! `serde_json`; it is not a general JSON parser.

/// Try to parse, repairing on failure.
///
/// This is the entry point agents use for their structured payloads.
pub fn parse_with_repair(input: &str) -> Result<serde_json::Value, serde_json::Error> {
    if let Ok(value) = serde_json::from_str(input) {
        return Ok(value);
    }
    serde_json::from_str(&repair(input))
}

/// Apply the repair passes: strip fences, drop trailing commas, close
/// truncated brackets.
pub fn repair(input: &str) -> String {
    close_truncated(&fix_trailing_commas(&strip_fences(input)))
}

fn strip_fences(input: &str) -> String {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

/// Remove commas that directly precede a closing bracket. String
/// contents are left untouched.
fn fix_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = input.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                // Look ahead past whitespace for a closer.
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Append closers for any brackets left open (truncated output).
fn close_truncated(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = input.to_string();
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_passes_through() {
        let value = parse_with_repair(r#"{"ok": true}"#).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn strips_markdown_fences() {
        let input = "```json\n{\"objective\": \"ocr\"}\n```";
        let value = parse_with_repair(input).unwrap();
        assert_eq!(value["objective"], "ocr");
    }

    #[test]
    fn removes_trailing_commas() {
        let value = parse_with_repair(r#"{"a": 1, "b": [1, 2,],}"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn trailing_comma_inside_string_untouched() {
        let value = parse_with_repair(r#"{"text": "a, }"}"#).unwrap();
        assert_eq!(value["text"], "a, }");
    }

    #[test]
    fn closes_truncated_object() {
        let value = parse_with_repair(r#"{"a": {"b": [1, 2"#).unwrap();
        assert_eq!(value, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn closes_truncated_string() {
        let value = parse_with_repair(r#"{"a": "unfinished"#).unwrap();
        assert_eq!(value["a"], "unfinished");
    }

    #[test]
    fn hopeless_input_still_errors() {
        assert!(parse_with_repair("not json at all").is_err());
    }
}
