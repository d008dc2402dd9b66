//! Log listing, clearing, and test page tests.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use hookbench_testing::{Backend, TestEnv, LOCAL};
use serde_json::json;

async fn seed(env: &TestEnv, count: usize) {
    for i in 0..count {
        env.post_form(&format!("seq={i}"), LOCAL).await.unwrap();
        env.clock.advance(Duration::from_millis(1));
    }
}

#[tokio::test]
async fn recent_returns_newest_ten() {
    for backend in [Backend::Memory, Backend::Sqlite] {
        let env = TestEnv::builder().backend(backend).build().await.unwrap();
        seed(&env, 12).await;

        let recent = env.get(&env.path("/logs/recent"), LOCAL).await.unwrap().json().unwrap();
        let full = env.get(&env.path("/logs/full"), LOCAL).await.unwrap().json().unwrap();
        let plain = env.get(&env.path("/logs"), LOCAL).await.unwrap().json().unwrap();

        let recent = recent.as_array().unwrap();
        let full = full.as_array().unwrap();
        assert_eq!(recent.len(), 10, "backend {backend:?}");
        assert_eq!(full.len(), 12);
        assert_eq!(recent.as_slice(), &full[..10]);
        assert_eq!(plain.as_array().unwrap(), full);
        assert_eq!(full[0]["body"], r#"{"seq":["11"]}"#);
    }
}

#[tokio::test]
async fn records_expose_id_method_time_body() {
    let env = TestEnv::new().await.unwrap();
    env.post_form("k=v", LOCAL).await.unwrap();

    let logs = env.get(&env.path("/logs"), LOCAL).await.unwrap().json().unwrap();
    let record = &logs[0];

    assert_eq!(record["id"], 1);
    assert_eq!(record["method"], "POST");
    assert_eq!(record["time"], "2024-12-10T00:00:00Z");
    assert_eq!(record["body"], r#"{"k":["v"]}"#);
}

#[tokio::test]
async fn clear_empties_the_log() {
    let env = TestEnv::builder().backend(Backend::Sqlite).build().await.unwrap();
    seed(&env, 3).await;

    let response = env.request(Method::DELETE, &env.path("/logs/clear"), LOCAL).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap(), json!({ "message": "Logs cleared successfully" }));

    let logs = env.get(&env.path("/logs"), LOCAL).await.unwrap().json().unwrap();
    assert_eq!(logs, json!([]));
}

#[tokio::test]
async fn clear_requires_delete() {
    let env = TestEnv::new().await.unwrap();
    seed(&env, 1).await;

    let response = env.get(&env.path("/logs/clear"), LOCAL).await.unwrap();

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(env.records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn page_is_html_pointing_at_base_path() {
    let env = TestEnv::builder().base_path("/hooks/demo").build().await.unwrap();

    let response = env.get("/hooks/demo/page", LOCAL).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.content_type().unwrap().starts_with("text/html"));
    assert!(response.text().contains("const BASE = '/hooks/demo';"));
}

#[tokio::test]
async fn custom_base_path_moves_every_route() {
    let env = TestEnv::builder().base_path("/hooks/demo").build().await.unwrap();

    assert_eq!(env.post_form("a=1", LOCAL).await.unwrap().status, StatusCode::OK);
    assert_eq!(env.get("/testcallback2/logs", LOCAL).await.unwrap().status, StatusCode::NOT_FOUND);
    assert_eq!(env.get("/hooks/demo/logs", LOCAL).await.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn every_response_carries_request_id() {
    let env = TestEnv::new().await.unwrap();

    let first = env.get(&env.path("/logs"), LOCAL).await.unwrap();
    let second = env.get(&env.path("/logs"), LOCAL).await.unwrap();

    let first_id = first.headers.get("x-request-id").unwrap();
    let second_id = second.headers.get("x-request-id").unwrap();
    assert_ne!(first_id, second_id);
}
