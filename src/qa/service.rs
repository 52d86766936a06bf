use std::collections::HashSet;
use std::sync::Arc;

use super::prompt::{format_context, script_prompt, test_case_prompt};
use super::types::{ScriptRequest, ScriptResponse, TestCaseResponse, TestPlan};
use crate::core::config::RetrievalSettings;
use crate::core::errors::ApiError;
use crate::llm::output::extract_code;
use crate::llm::LlmService;
use crate::rag::KnowledgeBase;

const MAX_K: usize = 100;

/// Test-case and script generation grounded in the knowledge base.
#[derive(Clone)]
pub struct QaService {
    knowledge_base: Arc<KnowledgeBase>,
    llm: LlmService,
    retrieval: RetrievalSettings,
}

impl QaService {
    pub fn new(
        knowledge_base: Arc<KnowledgeBase>,
        llm: LlmService,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            knowledge_base,
            llm,
            retrieval,
        }
    }

    pub async fn generate_test_cases(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<TestCaseResponse, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest("query must not be empty".to_string()));
        }
        let k = k.unwrap_or(self.retrieval.test_case_k).clamp(1, MAX_K);

        let hits = self.knowledge_base.retrieve(query, k).await?;
        let context = format_context(&hits);

        let value = self.llm.chat_json(test_case_prompt(&context, query)).await?;
        if value.get("test_cases").is_none() {
            return Err(ApiError::Upstream(
                "LLM returned an invalid response format: missing \"test_cases\"".to_string(),
            ));
        }
        let plan: TestPlan = serde_json::from_value(value).map_err(|err| {
            ApiError::Upstream(format!("LLM returned an invalid response format: {}", err))
        })?;

        let known: HashSet<String> = self
            .knowledge_base
            .source_names()
            .await?
            .into_iter()
            .collect();
        let ungrounded: Vec<String> = plan
            .test_cases
            .iter()
            .filter(|case| !known.contains(case.grounded_in.trim()))
            .map(|case| case.id.clone())
            .collect();

        if !ungrounded.is_empty() {
            tracing::warn!(?ungrounded, "Test cases cite sources outside the knowledge base");
        }
        tracing::info!(
            hits = hits.len(),
            test_cases = plan.test_cases.len(),
            "Generated test cases"
        );

        Ok(TestCaseResponse {
            test_cases: plan.test_cases,
            ungrounded,
        })
    }

    pub async fn generate_script(&self, request: ScriptRequest) -> Result<ScriptResponse, ApiError> {
        let ScriptRequest {
            test_case,
            html_content,
        } = request;

        let hits = self
            .knowledge_base
            .retrieve(&test_case.feature, self.retrieval.script_k.clamp(1, MAX_K))
            .await?;
        let context = format_context(&hits);

        let (html, html_source) = match html_content.filter(|html| !html.trim().is_empty()) {
            Some(html) => (html, Some("request".to_string())),
            None => match self.knowledge_base.latest_html().await? {
                Some(page) => (page.content, Some(page.source)),
                None => (String::new(), None),
            },
        };

        let test_case_json = serde_json::to_string_pretty(&test_case).map_err(ApiError::internal)?;
        let output = self
            .llm
            .chat_text(script_prompt(&test_case_json, &html, &context))
            .await?;

        tracing::info!(
            test_case = %test_case.id,
            html_source = html_source.as_deref().unwrap_or("none"),
            "Generated script"
        );

        Ok(ScriptResponse {
            script: extract_code(&output),
            html_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::config::LlmSettings;
    use crate::llm::{ChatRequest, LlmProvider};
    use crate::qa::types::TestCase;
    use crate::rag::{Chunker, Document, HashEmbedder, SqliteRagStore};

    struct ScriptedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            Ok(self.reply.clone())
        }
    }

    async fn service(
        dir: &tempfile::TempDir,
        reply: &str,
    ) -> (QaService, Arc<KnowledgeBase>, Arc<ScriptedProvider>) {
        let store = SqliteRagStore::open(dir.path()).await.unwrap();
        let kb = Arc::new(KnowledgeBase::new(
            Arc::new(store),
            Arc::new(HashEmbedder::new(128)),
            Chunker::new(1000, 200).unwrap(),
        ));
        let provider = Arc::new(ScriptedProvider {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let llm = LlmService::with_provider(provider.clone(), &LlmSettings::default());
        (
            QaService::new(kb.clone(), llm, RetrievalSettings::default()),
            kb,
            provider,
        )
    }

    fn doc(source: &str, content: &str) -> Document {
        Document {
            content: content.to_string(),
            source: source.to_string(),
        }
    }

    fn test_case() -> TestCase {
        TestCase {
            id: "TC-001".to_string(),
            feature: "Discount Code".to_string(),
            scenario: "Apply SAVE15".to_string(),
            expected_result: "Total reduced by 15%".to_string(),
            grounded_in: "product_specs.md".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cases_report_ungrounded_ids() {
        let dir = tempfile::tempdir().unwrap();
        let reply = r#"```json
{"test_cases": [
  {"id": "TC-001", "feature": "Discount Code", "scenario": "Apply SAVE15",
   "expected_result": "15% off", "grounded_in": "product_specs.md"},
  {"id": "TC-002", "feature": "Gift Wrap", "scenario": "Add wrap",
   "expected_result": "Wrapped", "grounded_in": "imaginary.md"}
]}
```"#;
        let (qa, kb, provider) = service(&dir, reply).await;
        kb.ingest(vec![doc("product_specs.md", "Discount code SAVE15 gives 15% off.")])
            .await
            .unwrap();

        let response = qa.generate_test_cases("discount code", None).await.unwrap();
        assert_eq!(response.test_cases.len(), 2);
        assert_eq!(response.ungrounded, vec!["TC-002"]);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Source: product_specs.md\nContent: Discount code SAVE15"));
        assert!(prompts[0].contains("User Request: discount code"));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (qa, _, _) = service(&dir, "{}").await;
        let err = qa.generate_test_cases("   ", None).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn missing_test_cases_key_is_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let (qa, _, _) = service(&dir, r#"{"cases": []}"#).await;
        let err = qa.generate_test_cases("checkout", Some(3)).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(msg) if msg.contains("invalid response format")));
    }

    #[tokio::test]
    async fn script_uses_request_html_and_extracts_code() {
        let dir = tempfile::tempdir().unwrap();
        let reply = "Here you go:\n```python\nfrom selenium import webdriver\n```";
        let (qa, _, provider) = service(&dir, reply).await;

        let response = qa
            .generate_script(ScriptRequest {
                test_case: test_case(),
                html_content: Some("<input id=\"discount-code\">".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(response.script, "from selenium import webdriver");
        assert_eq!(response.html_source.as_deref(), Some("request"));

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"id\": \"TC-001\""));
        assert!(prompts[0].contains("<input id=\"discount-code\">"));
    }

    #[tokio::test]
    async fn script_falls_back_to_latest_uploaded_html() {
        let dir = tempfile::tempdir().unwrap();
        let (qa, kb, provider) = service(&dir, "driver = webdriver.Chrome()").await;

        let response = qa
            .generate_script(ScriptRequest {
                test_case: test_case(),
                html_content: None,
            })
            .await
            .unwrap();
        assert_eq!(response.html_source, None);
        assert_eq!(response.script, "driver = webdriver.Chrome()");

        kb.ingest(vec![doc("checkout.html", "<button id=\"pay-now\">Pay</button>")])
            .await
            .unwrap();
        let response = qa
            .generate_script(ScriptRequest {
                test_case: test_case(),
                html_content: Some("  ".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(response.html_source.as_deref(), Some("checkout.html"));
        assert!(provider.prompts.lock().unwrap()[1].contains("pay-now"));
    }
}
