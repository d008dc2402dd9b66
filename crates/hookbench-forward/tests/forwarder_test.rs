//! End-to-end tests for the background forwarder against a mock
//! destination and an in-memory log store.

use std::{sync::Arc, time::Duration};

use hookbench_core::{CallbackMethod, FormData, LogId, LogStore, MemoryLogStore};
use hookbench_forward::{ForwardClient, ForwardJob, Forwarder};
use http::{HeaderMap, HeaderValue, Method};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

async fn logged_post(store: &MemoryLogStore, form: &FormData) -> LogId {
    store.append(CallbackMethod::Post, Some(form.to_log_text())).await.unwrap()
}

async fn wait_for_body(store: &MemoryLogStore, id: LogId, needle: &str) -> String {
    for _ in 0..100 {
        let records = store.list_all().await.unwrap();
        if let Some(body) = records.iter().find(|r| r.id == id).and_then(|r| r.body.clone()) {
            if body.contains(needle) {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("record {id} never contained {needle:?}");
}

fn job(log_id: LogId, form: FormData) -> ForwardJob {
    let mut headers = HeaderMap::new();
    headers.insert("x-signature", HeaderValue::from_static("sig-123"));
    ForwardJob { log_id, method: Method::POST, headers, form }
}

#[tokio::test]
async fn successful_forward_records_status() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/sink"))
        .and(matchers::body_string("order=42&state=paid"))
        .and(matchers::header("x-signature", "sig-123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryLogStore::new());
    let client = ForwardClient::with_timeout(Duration::from_secs(5)).unwrap();
    let (forwarder, worker) =
        Forwarder::spawn(client, store.clone(), format!("{}/sink", mock_server.uri()));

    let form = FormData::from_pairs([("order", "42"), ("state", "paid"), ("order", "43")]);
    let id = logged_post(&store, &form).await;
    forwarder.schedule(job(id, form));

    let body = wait_for_body(&store, id, "forward_status=").await;
    assert_eq!(body, "{\"order\":[\"42\",\"43\"],\"state\":[\"paid\"]}\nforward_status=200");

    drop(forwarder);
    worker.await.unwrap();
}

#[tokio::test]
async fn unreachable_destination_records_error() {
    let store = Arc::new(MemoryLogStore::new());
    let client = ForwardClient::with_timeout(Duration::from_secs(2)).unwrap();
    let (forwarder, _worker) = Forwarder::spawn(client, store.clone(), "http://127.0.0.1:9/sink");

    let form = FormData::from_pairs([("a", "1")]);
    let id = logged_post(&store, &form).await;
    forwarder.schedule(job(id, form));

    let body = wait_for_body(&store, id, "forward_error=").await;
    assert!(body.starts_with("{\"a\":[\"1\"]}\nforward_error="));
    assert_eq!(body.lines().count(), 2);
}

#[tokio::test]
async fn worker_drains_in_flight_jobs_after_last_handle_drops() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(200)))
        .expect(3)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryLogStore::new());
    let client = ForwardClient::with_timeout(Duration::from_secs(5)).unwrap();
    let (forwarder, worker) = Forwarder::spawn(client, store.clone(), mock_server.uri());

    let mut ids = Vec::new();
    for i in 0..3 {
        let form = FormData::from_pairs([("n", i.to_string())]);
        let id = logged_post(&store, &form).await;
        forwarder.schedule(job(id, form));
        ids.push(id);
    }

    drop(forwarder);
    tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();

    let records = store.list_all().await.unwrap();
    for id in ids {
        let record = records.iter().find(|r| r.id == id).unwrap();
        assert!(record.body.as_deref().unwrap().ends_with("\nforward_status=201"));
    }
}

#[tokio::test]
async fn outcome_for_cleared_record_is_dropped() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryLogStore::new());
    let client = ForwardClient::with_timeout(Duration::from_secs(5)).unwrap();
    let (forwarder, worker) = Forwarder::spawn(client, store.clone(), mock_server.uri());

    let form = FormData::from_pairs([("k", "v")]);
    let id = logged_post(&store, &form).await;
    forwarder.schedule(job(id, form));
    store.clear_all().await.unwrap();

    drop(forwarder);
    worker.await.unwrap();

    assert!(store.is_empty().await);
}
