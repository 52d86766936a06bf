//! Parsing of free-form model output.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::core::errors::ApiError;

static CODE_FENCE: OnceLock<Option<Regex>> = OnceLock::new();

fn code_fence() -> Option<&'static Regex> {
    CODE_FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)```").ok())
        .as_ref()
}

/// Body of the first fenced code block, if there is one.
fn first_fenced_block(text: &str) -> Option<&str> {
    code_fence()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses a JSON object out of model output.
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or JSON embedded
/// in prose (the outermost `{...}` span is used).
pub fn parse_json_output(text: &str) -> Result<Value, ApiError> {
    let trimmed = text.trim();
    let candidate = first_fenced_block(trimmed).unwrap_or(trimmed).trim();

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(value);
    }

    let span = match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if start < end => &candidate[start..=end],
        _ => {
            return Err(ApiError::Upstream(
                "Model output does not contain a JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str(span)
        .map_err(|err| ApiError::Upstream(format!("Model returned invalid JSON: {}", err)))
}

/// Code from model output: the first fenced block, else the whole text.
///
/// A fence that is opened but never closed (truncated output) still has its
/// opening line removed.
pub fn extract_code(text: &str) -> String {
    if let Some(body) = first_fenced_block(text) {
        return body.trim_end().to_string();
    }

    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let body = trimmed.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().trim_end_matches("```").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_and_fenced_json() {
        assert_eq!(
            parse_json_output(r#" {"test_cases": []} "#).unwrap(),
            json!({"test_cases": []})
        );

        let fenced = "```json\n{\"test_cases\": [{\"id\": \"TC-001\"}]}\n```";
        assert_eq!(
            parse_json_output(fenced).unwrap(),
            json!({"test_cases": [{"id": "TC-001"}]})
        );
    }

    #[test]
    fn falls_back_to_outermost_braces() {
        let text = "Here is the plan:\n{\"test_cases\": [{\"id\": \"TC-001\"}]}\nLet me know!";
        assert_eq!(
            parse_json_output(text).unwrap()["test_cases"][0]["id"],
            "TC-001"
        );
    }

    #[test]
    fn rejects_output_without_json() {
        assert!(matches!(
            parse_json_output("I cannot help with that."),
            Err(ApiError::Upstream(_))
        ));
        assert!(matches!(
            parse_json_output("{ broken"),
            Err(ApiError::Upstream(_))
        ));
    }

    #[test]
    fn extracts_first_code_block() {
        let text = "Sure:\n```python\nfrom selenium import webdriver\n\ndriver = webdriver.Chrome()\n```\nDone.";
        assert_eq!(
            extract_code(text),
            "from selenium import webdriver\n\ndriver = webdriver.Chrome()"
        );

        let bare = "\n  driver = webdriver.Chrome()\n";
        assert_eq!(extract_code(bare), "driver = webdriver.Chrome()");
    }

    #[test]
    fn unlabelled_fence_is_extracted() {
        assert_eq!(extract_code("```\nprint('ok')\n```"), "print('ok')");
    }

    #[test]
    fn unterminated_fence_drops_opening_line() {
        let truncated = "```python\nimport os\ndriver = webdriver.Chrome()";
        assert_eq!(extract_code(truncated), "import os\ndriver = webdriver.Chrome()");
        assert_eq!(extract_code("```python"), "");
    }
}
