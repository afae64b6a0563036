//! End-to-end REST facade tests against a real HTTP server.
//!
//! Scenarios mirror the worked examples for the happy path, error path,
//! reset-on-error, bulk-process-with-ids, and idempotent-fingerprint.

mod common;

use common::TestServer;
use reqwest::StatusCode;
use std::collections::HashMap;

#[tokio::test]
async fn happy_path_lifecycle() {
    let server = TestServer::start().await;

    let post = server.client.post(server.url("/api/modules/upper/")).body("hello").send().await.unwrap();
    assert_eq!(post.status(), StatusCode::ACCEPTED);
    let id = post.headers().get("ID").unwrap().to_str().unwrap().to_owned();
    assert_eq!(id, "0x5d41402abc4b2a76b9719d911017c592");

    let head = server.client.head(server.url(&format!("/api/modules/upper/{id}"))).send().await.unwrap();
    assert_eq!(head.status(), StatusCode::ACCEPTED);
    assert_eq!(head.headers().get("Status").unwrap(), "PENDING");

    let claim = server.client.get(server.url("/api/modules/upper/")).send().await.unwrap();
    assert_eq!(claim.status(), StatusCode::OK);
    assert_eq!(claim.headers().get("ID").unwrap(), id.as_str());
    assert_eq!(claim.text().await.unwrap(), "hello");

    let head = server.client.head(server.url(&format!("/api/modules/upper/{id}"))).send().await.unwrap();
    assert_eq!(head.headers().get("Status").unwrap(), "STARTED");

    let put = server
        .client
        .put(server.url(&format!("/api/modules/upper/{id}")))
        .body("HELLO")
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::NO_CONTENT);

    let head = server.client.head(server.url(&format!("/api/modules/upper/{id}"))).send().await.unwrap();
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(head.headers().get("Status").unwrap(), "DONE");

    let get = server.client.get(server.url(&format!("/api/modules/upper/{id}"))).send().await.unwrap();
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(get.text().await.unwrap(), "HELLO");
}

#[tokio::test]
async fn error_path_reports_processing_error() {
    let server = TestServer::start().await;

    let post = server.client.post(server.url("/api/modules/upper/")).body("doc").send().await.unwrap();
    let id = post.headers().get("ID").unwrap().to_str().unwrap().to_owned();

    server.client.get(server.url("/api/modules/upper/")).send().await.unwrap();

    let put = server
        .client
        .put(server.url(&format!("/api/modules/upper/{id}")))
        .header("Content-Type", "application/prs.error+text")
        .body("boom")
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::NO_CONTENT);

    let head = server.client.head(server.url(&format!("/api/modules/upper/{id}"))).send().await.unwrap();
    assert_eq!(head.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(head.headers().get("Status").unwrap(), "ERROR");

    let get = server.client.get(server.url(&format!("/api/modules/upper/{id}"))).send().await.unwrap();
    assert_eq!(get.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = get.json().await.unwrap();
    assert_eq!(body["message"], "boom");
}

#[tokio::test]
async fn unknown_task_is_404() {
    let server = TestServer::start().await;
    let head = server
        .client
        .head(server.url("/api/modules/upper/0x00000000000000000000000000000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(head.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_module_is_404() {
    let server = TestServer::start().await;
    let post = server.client.post(server.url("/api/modules/nope/")).body("x").send().await.unwrap();
    assert_eq!(post.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn claim_on_empty_queue_is_404() {
    let server = TestServer::start().await;
    let claim = server.client.get(server.url("/api/modules/upper/")).send().await.unwrap();
    assert_eq!(claim.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_process_with_explicit_ids() {
    let server = TestServer::start().await;

    let mut docs = HashMap::new();
    docs.insert("a", "x");
    docs.insert("b", "y");
    docs.insert("c", "z");

    let resp = server
        .client
        .post(server.url("/api/modules/upper/bulk/process"))
        .json(&docs)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mut ids: Vec<String> = resp.json().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let status_resp = server
        .client
        .post(server.url("/api/modules/upper/bulk/status"))
        .json(&ids)
        .send()
        .await
        .unwrap();
    let statuses: HashMap<String, String> = status_resp.json().await.unwrap();
    for id in &ids {
        assert_eq!(statuses[id], "PENDING");
    }
}

#[tokio::test]
async fn idempotent_fingerprint_does_not_duplicate_queue_entries() {
    let server = TestServer::start().await;

    let first = server.client.post(server.url("/api/modules/upper/")).body("same bytes").send().await.unwrap();
    let second = server.client.post(server.url("/api/modules/upper/")).body("same bytes").send().await.unwrap();

    let id1 = first.headers().get("ID").unwrap().to_str().unwrap().to_owned();
    let id2 = second.headers().get("ID").unwrap().to_str().unwrap().to_owned();
    assert_eq!(id1, id2);

    let index = server.client.get(server.url("/")).send().await.unwrap();
    let body = index.text().await.unwrap();
    assert!(body.contains("PENDING: 1"));
}

#[tokio::test]
async fn checktoken_succeeds_when_auth_is_disabled() {
    let server = TestServer::start().await;
    let resp = server.client.get(server.url("/checktoken")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
