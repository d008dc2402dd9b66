//! Background forwarding through the full router.

use std::time::Duration;

use axum::http::StatusCode;
use hookbench_core::LogId;
use hookbench_testing::{mock_destination, TestEnv, LOCAL};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const OUTCOME_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn unreachable_destination_is_recorded_as_error() {
    let env = TestEnv::builder()
        .forward_to("http://127.0.0.1:9/unreachable")
        .outbound_timeout(Duration::from_secs(2))
        .build()
        .await
        .unwrap();

    let response = env.post_form("order=7", LOCAL).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().ends_with("Response.forwardUrl=http://127.0.0.1:9/unreachable"));

    let record = env.wait_for_outcome(LogId(1), OUTCOME_TIMEOUT).await.unwrap();
    let body = record.body.unwrap();
    let mut lines = body.lines();
    assert_eq!(lines.next(), Some(r#"{"order":["7"]}"#));
    assert!(lines.next().unwrap().starts_with("forward_error="));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn delivered_forward_records_status() {
    let sink = mock_destination(202).await;
    let env = TestEnv::builder().forward_to(format!("{}/in", sink.uri())).build().await.unwrap();

    env.post_form("a=1&b=2", LOCAL).await.unwrap();

    let record = env.wait_for_outcome(LogId(1), OUTCOME_TIMEOUT).await.unwrap();
    assert!(record.body.unwrap().ends_with("\nforward_status=202"));
}

#[tokio::test]
async fn forwarded_body_keeps_first_values_and_caller_headers() {
    let sink = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/in"))
        .and(matchers::body_string("a=1&b=2"))
        .and(matchers::header("content-type", "application/x-www-form-urlencoded"))
        .and(matchers::header("x-signature", "sig"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sink)
        .await;

    let env = TestEnv::builder().forward_to(format!("{}/in", sink.uri())).build().await.unwrap();

    let request = hookbench_testing::request_from(axum::http::Method::POST, env.base_path(), LOCAL)
        .header("content-type", "application/x-www-form-urlencoded")
        .header("x-signature", "sig")
        .body(axum::body::Body::from("a=1&b=2&a=3"))
        .unwrap();
    env.send(request).await.unwrap();

    env.wait_for_outcome(LogId(1), OUTCOME_TIMEOUT).await.unwrap();
    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn json_bodies_are_forwarded_form_encoded() {
    let sink = MockServer::start().await;
    Mock::given(matchers::body_string("foo=bar"))
        .and(matchers::header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sink)
        .await;

    let env = TestEnv::builder().forward_to(sink.uri()).build().await.unwrap();
    env.post(env.base_path(), "application/json", r#"{"foo":"bar"}"#, LOCAL).await.unwrap();

    let record = env.wait_for_outcome(LogId(1), OUTCOME_TIMEOUT).await.unwrap();
    assert!(record.body.unwrap().ends_with("forward_status=200"));
}

#[tokio::test]
async fn gets_and_rejected_posts_are_not_forwarded() {
    let sink = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&sink)
        .await;

    let env = TestEnv::builder().forward_to(sink.uri()).build().await.unwrap();
    env.get(env.base_path(), LOCAL).await.unwrap();
    env.post(env.base_path(), "text/csv", "a,b", LOCAL).await.unwrap();
    env.shutdown().await.unwrap();
}
