use serde::{Deserialize, Serialize};

/// One generated test case. `grounded_in` names the source document the
/// case was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub feature: String,
    pub scenario: String,
    pub expected_result: String,
    #[serde(default)]
    pub grounded_in: String,
}

/// The JSON object the model is asked to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResponse {
    pub test_cases: Vec<TestCase>,
    /// Ids of test cases citing a file that is not in the knowledge base.
    pub ungrounded: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRequest {
    pub test_case: TestCase,
    #[serde(default)]
    pub html_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResponse {
    pub script: String,
    /// `"request"`, the remembered HTML filename, or null when the prompt had
    /// no page markup.
    pub html_source: Option<String>,
}
