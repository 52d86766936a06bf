//! QA use cases: grounded test-case generation and Selenium script generation.

pub mod prompt;
pub mod service;
pub mod types;

pub use service::QaService;
pub use types::{
    ScriptRequest, ScriptResponse, TestCase, TestCaseRequest, TestCaseResponse, TestPlan,
};
