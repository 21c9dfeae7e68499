//! HTTP API tests: the router served on an ephemeral port over an
//! in-memory store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use contract_desk::config::{
    ChunkingConfig, Config, DbConfig, LlmConfig, SamplingConfig, ServerConfig,
};
use contract_desk::llm::{DisabledClient, LlmClient, LlmError};
use contract_desk::server::{router, AppState};
use contract_desk_core::models::ContractRecord;
use contract_desk_core::store::memory::InMemoryStore;

struct FixedLlm(&'static str);

#[async_trait]
impl LlmClient for FixedLlm {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

fn config() -> Config {
    Config {
        db: DbConfig {
            path: PathBuf::from("unused.sqlite"),
        },
        llm: LlmConfig::default(),
        chunking: ChunkingConfig::default(),
        sampling: SamplingConfig { default_size: 2 },
        server: ServerConfig::default(),
    }
}

fn contract(id: &str, region: &str, flow: &str) -> ContractRecord {
    ContractRecord {
        region: Some(region.to_string()),
        flow_type: Some(flow.to_string()),
        risk_level: Some("High".to_string()),
        ..ContractRecord::new(id)
    }
}

async fn spawn(records: Vec<ContractRecord>, llm: Arc<dyn LlmClient>) -> SocketAddr {
    let state = AppState {
        config: Arc::new(config()),
        store: Arc::new(InMemoryStore::with_contracts(records)),
        llm,
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

fn portfolio() -> Vec<ContractRecord> {
    vec![
        contract("A", "South", "RE"),
        contract("B", "South", "FI"),
        contract("C", "North", "RE"),
        contract("D", "North", "RC"),
    ]
}

#[tokio::test]
async fn health_reports_ok() {
    let addr = spawn(Vec::new(), Arc::new(DisabledClient)).await;
    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn contracts_accept_query_filters() {
    let addr = spawn(portfolio(), Arc::new(DisabledClient)).await;
    let body: Value = reqwest::get(format!(
        "http://{}/contracts?flow_types=RE&region=north",
        addr
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["contracts"][0]["id"], "C");
}

#[tokio::test]
async fn invalid_query_uses_error_body() {
    let addr = spawn(portfolio(), Arc::new(DisabledClient)).await;
    let resp = reqwest::get(format!("http://{}/contracts?due=whenever", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn sample_uses_default_size_and_covers_regions() {
    let addr = spawn(portfolio(), Arc::new(DisabledClient)).await;
    let http = reqwest::Client::new();
    let body: Value = http
        .post(format!("http://{}/contracts/sample", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let regions: Vec<&str> = body["contracts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["region"].as_str().unwrap())
        .collect();
    assert_eq!(regions, vec!["South", "North"]);
}

#[tokio::test]
async fn sample_rejects_negative_size() {
    let addr = spawn(portfolio(), Arc::new(DisabledClient)).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/contracts/sample", addr))
        .json(&json!({ "size": -2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn sample_of_empty_store_is_not_found() {
    let addr = spawn(Vec::new(), Arc::new(DisabledClient)).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/contracts/sample", addr))
        .json(&json!({ "size": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "no contracts available");
}

#[tokio::test]
async fn stats_cover_every_dimension() {
    let addr = spawn(portfolio(), Arc::new(DisabledClient)).await;
    let body: Value = reqwest::get(format!("http://{}/stats", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total"], 4);
    assert_eq!(body["dimensions"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn filters_start_empty() {
    let addr = spawn(Vec::new(), Arc::new(DisabledClient)).await;
    let body: Value = reqwest::get(format!("http://{}/filters", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["filters"], json!([]));
}

#[tokio::test]
async fn infer_filter_uses_llm() {
    let addr = spawn(
        portfolio(),
        Arc::new(FixedLlm(r#"{"filter_type": "dropdown", "config": {"options": ["High"]}}"#)),
    )
    .await;
    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/filters/infer", addr))
        .json(&json!({ "column": "risk_level" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["kind"], "dropdown");
    assert_eq!(body["samples"], json!(["High"]));
}

#[tokio::test]
async fn infer_filter_reports_disabled_llm() {
    let addr = spawn(portfolio(), Arc::new(DisabledClient)).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/filters/infer", addr))
        .json(&json!({ "column": "risk_level" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "llm_disabled");
}

#[tokio::test]
async fn infer_filter_rejects_unknown_column() {
    let addr = spawn(portfolio(), Arc::new(FixedLlm("dropdown"))).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/filters/infer", addr))
        .json(&json!({ "column": "colour" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("unknown column 'colour'"));
}

#[tokio::test]
async fn infer_filter_reports_unusable_reply() {
    let addr = spawn(portfolio(), Arc::new(FixedLlm("a slider, probably"))).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/filters/infer", addr))
        .json(&json!({ "column": "risk_level" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "llm_error");
}
