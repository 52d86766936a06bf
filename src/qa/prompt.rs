//! Prompt templates for test-case and script generation.

use crate::llm::types::{ChatMessage, ChatRequest};
use crate::rag::ChunkSearchResult;

const TEST_CASE_TEMPLATE: &str = "You are an expert QA Automation Engineer.\n\
Based on the following context (Project Documentation and HTML structure), generate a comprehensive list of test cases for the requested feature.\n\
\n\
Context:\n\
{context}\n\
\n\
User Request: {query}\n\
\n\
Output Format:\n\
Provide the response as a JSON object with a key \"test_cases\" containing a list of objects.\n\
Each object should have:\n\
- \"id\": \"TC-XXX\"\n\
- \"feature\": \"Feature Name\"\n\
- \"scenario\": \"Description of the test scenario\"\n\
- \"expected_result\": \"Expected outcome\"\n\
- \"grounded_in\": \"Source document filename\"\n\
\n\
Ensure NO hallucinations. Only use features described in the context.";

const SCRIPT_TEMPLATE: &str = "You are an expert Python Selenium Automation Engineer.\n\
Generate a complete, runnable Python Selenium script for the following test case.\n\
\n\
Test Case:\n\
{test_case}\n\
\n\
HTML Structure (Target Page):\n\
{html_content}\n\
\n\
Additional Context (Rules/Specs):\n\
{context}\n\
\n\
Requirements:\n\
1. Use 'webdriver.Chrome()' (assume chromedriver is in path or managed by webdriver-manager).\n\
2. Use explicit waits (WebDriverWait) where appropriate.\n\
3. Use precise selectors based on the provided HTML (ID, CSS, XPath).\n\
4. Include assertions to verify the Expected Result.\n\
5. Return ONLY the Python code, no markdown formatting if possible, or inside a single code block.";

/// Renders retrieved chunks as the context block of a prompt.
pub fn format_context(results: &[ChunkSearchResult]) -> String {
    results
        .iter()
        .map(|hit| format!("Source: {}\nContent: {}", hit.chunk.source, hit.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Substitutes `{name}` placeholders in a single pass.
///
/// Unknown placeholders stay as written and substituted values are not
/// scanned again, so braces inside documents or JSON pass through intact.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn test_case_prompt(context: &str, query: &str) -> ChatRequest {
    let prompt = render(TEST_CASE_TEMPLATE, &[("context", context), ("query", query)]);
    ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.0)
}

pub fn script_prompt(test_case_json: &str, html_content: &str, context: &str) -> ChatRequest {
    let prompt = render(
        SCRIPT_TEMPLATE,
        &[
            ("test_case", test_case_json),
            ("html_content", html_content),
            ("context", context),
        ],
    );
    ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.0)
}
