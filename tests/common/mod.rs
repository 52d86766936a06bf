#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use qa_agent_backend::core::config::{AppPaths, ConfigService};
use qa_agent_backend::server::router::router;
use qa_agent_backend::state::AppState;

pub const TEST_PLAN_REPLY: &str = r#"```json
{"test_cases": [
  {"id": "TC-001", "feature": "Discount Code", "scenario": "Apply SAVE15 at checkout",
   "expected_result": "Total is reduced by 15%", "grounded_in": "product_specs.md"},
  {"id": "TC-002", "feature": "Gift Wrap", "scenario": "Add gift wrap",
   "expected_result": "Gift wrap fee is added", "grounded_in": "wishlist.md"}
]}
```"#;

pub const SCRIPT_REPLY: &str = "Here is the script:\n```python\nfrom selenium import webdriver\n\ndriver = webdriver.Chrome()\ndriver.find_element(\"id\", \"discount-code\")\n```";

/// OpenAI-compatible chat endpoint that answers by prompt role and keeps
/// every prompt it receives.
#[derive(Clone, Default)]
pub struct StubLlm {
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl StubLlm {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

async fn chat_completions(State(stub): State<StubLlm>, Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["messages"][0]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let reply = if prompt.contains("Selenium Automation Engineer") {
        SCRIPT_REPLY
    } else {
        TEST_PLAN_REPLY
    };
    stub.prompts.lock().unwrap().push(prompt);

    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": reply}}]
    }))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn spawn_stub_llm() -> (String, StubLlm) {
    let stub = StubLlm::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(stub.clone());
    (serve(app).await, stub)
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Boots the real router over a fresh data directory holding `config_yaml`.
/// `OPENAI_*` variables are ignored so the stub server is always the target.
pub async fn spawn_app(config_yaml: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    write_config(&data_dir, config_yaml);

    let paths = Arc::new(AppPaths::with_data_dir(dir.path().to_path_buf(), data_dir));
    let config = ConfigService::new(paths).without_env_overrides();
    let state = AppState::initialize(config).await.unwrap();
    let base_url = serve(router(state.clone())).await;

    TestApp {
        base_url,
        client: reqwest::Client::new(),
        state,
        _dir: dir,
    }
}

fn write_config(data_dir: &Path, config_yaml: &str) {
    std::fs::write(data_dir.join("config.yml"), config_yaml).unwrap();
}

pub fn configured_yaml(llm_base_url: &str) -> String {
    format!(
        "llm:\n  base_url: \"{}\"\n  api_key: \"sk-test\"\n  model: \"stub-model\"\nembedding:\n  provider: hash\n  dimension: 256\n",
        llm_base_url
    )
}

pub fn file_part(name: &str, content: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(content.as_bytes().to_vec()).file_name(name.to_string())
}
