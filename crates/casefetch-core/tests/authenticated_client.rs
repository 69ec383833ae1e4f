mod common;

use casefetch_core::{CredentialStore, RequestError, RequestSpec};
use common::{Harness, STALE_TOKEN};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn data_spec(server: &MockServer) -> RequestSpec {
    RequestSpec::get(&format!("{}/data", server.uri())).unwrap()
}

#[tokio::test]
async fn invalidated_once_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", format!("Bearer {STALE_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(500).set_body_string("session expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::with_stale_token(&server);
    let value: Value = harness.client().get_json(&data_spec(&server)).await.unwrap();

    assert_eq!(value, json!({ "ok": true }));
    assert_eq!(harness.refresher.calls(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(harness.store.load().unwrap().token(), "token-1");
}

#[tokio::test]
async fn invalidated_twice_surfaces_second_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", format!("Bearer {STALE_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(500).set_body_string("first failure"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("second failure"))
        .mount(&server)
        .await;

    let harness = Harness::with_stale_token(&server);
    let err = harness.client().get_text(&data_spec(&server)).await.unwrap_err();

    match err {
        RequestError::Upstream { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "second failure");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.refresher.calls(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn other_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such case"))
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::with_stale_token(&server);
    let err = harness.client().get_text(&data_spec(&server)).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "HTTP 404: no such case");
    assert_eq!(harness.refresher.calls(), 0);
}

#[tokio::test]
async fn absent_credential_logs_in_before_first_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::empty(&server);
    let body = harness.client().get_text(&data_spec(&server)).await.unwrap();

    assert_eq!(body, "hello");
    assert_eq!(harness.refresher.calls(), 1);
    assert_eq!(harness.store.saves(), 1);
}

#[tokio::test]
async fn transport_errors_are_not_retried() {
    let server = MockServer::start().await;
    let harness = Harness::with_stale_token(&server);
    let spec = RequestSpec::get("http://127.0.0.1:1/data").unwrap();

    let err = harness.client().get_text(&spec).await.unwrap_err();

    assert!(matches!(err, RequestError::Transport(_)));
    assert_eq!(harness.refresher.calls(), 0);
}

#[tokio::test]
async fn refreshed_token_is_used_by_later_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", format!("Bearer {STALE_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(3)
        .mount(&server)
        .await;

    let harness = Harness::with_stale_token(&server);
    let client = harness.client();
    for _ in 0..3 {
        assert_eq!(client.get_text(&data_spec(&server)).await.unwrap(), "ok");
    }
    assert_eq!(harness.refresher.calls(), 1);
}

#[tokio::test]
async fn concurrent_invalidations_share_one_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", format!("Bearer {STALE_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let harness = Harness::with_stale_token(&server);
    let client = harness.client();
    let spec = data_spec(&server);

    let results =
        futures_util::future::join_all((0..6).map(|_| client.get_text(&spec))).await;

    assert!(results.iter().all(|r| r.as_deref().ok() == Some("ok")));
    assert_eq!(harness.refresher.calls(), 1);
}

#[tokio::test]
async fn bytes_download_uses_same_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/model.stl"))
        .and(header("Authorization", format!("Bearer {STALE_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/model.stl"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"solid model".to_vec()))
        .mount(&server)
        .await;

    let harness = Harness::with_stale_token(&server);
    let bytes = harness
        .portal()
        .download_attachment(&format!("{}/files/model.stl", server.uri()))
        .await
        .unwrap();

    assert_eq!(&bytes[..], b"solid model");
    assert_eq!(harness.refresher.calls(), 1);
}
