use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use coral_club_core::merge::StateKeys;
use coral_club_core::sync::{ProxyTransport, Replica, ReplicaConfig};
use coral_club_core::{KvStore, MemoryKv, ProxyKvClient, RestKvClient, StateDocument};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{create_router, AppState};

async fn spawn_server(kv: Arc<dyn KvStore>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(AppState::new(kv)))
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

async fn call(kv: Arc<dyn KvStore>, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = create_router(AppState::new(kv))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(Arc::new(MemoryKv::new()), "GET", "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_non_post_is_405() {
    for uri in ["/api/kv-get", "/api/kv-set", "/api/kv-incr", "/api/kv-merge"] {
        let (status, _) = call(Arc::new(MemoryKv::new()), "GET", uri, "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", uri);
    }
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let (status, _) = call(kv.clone(), "POST", "/api/kv-get", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(kv.clone(), "POST", "/api/kv-set", r#"{"value": 1}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(kv, "POST", "/api/kv-incr", r#"{"key": ""}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_patch_is_400_and_state_untouched() {
    let kv = Arc::new(MemoryKv::new());
    kv.set("s", &json!({ "rev": 3 })).await.unwrap();

    let (status, body) = call(
        kv.clone(),
        "POST",
        "/api/kv-merge",
        r#"{"stateKey": "s", "revKey": "r", "patch": {"tents": "oops"}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"], "invalid_patch");
    assert_eq!(kv.peek("s").await, Some(json!({ "rev": 3 })));
    assert_eq!(kv.peek("r").await, None);
}

#[tokio::test]
async fn test_transport_failure_is_502() {
    let kv = Arc::new(MemoryKv::new());
    kv.fail_gets(true);
    let (status, _) = call(kv, "POST", "/api/kv-get", r#"{"key": "s"}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upstream_status_passed_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get/state"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&upstream)
        .await;

    let kv = Arc::new(RestKvClient::new(upstream.uri(), "wrong"));
    let (status, body) = call(kv, "POST", "/api/kv-get", r#"{"key": "state"}"#).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "bad token");
}

#[tokio::test]
async fn test_primitives_over_http() {
    let base = spawn_server(Arc::new(MemoryKv::new())).await;
    let client = ProxyKvClient::new(&base);

    assert_eq!(client.get("k").await.unwrap(), None);
    assert!(client.set("k", &json!({ "a": [1, 2] })).await.unwrap());
    assert_eq!(client.get("k").await.unwrap(), Some(json!({ "a": [1, 2] })));
    assert_eq!(client.incr("n").await.unwrap(), 1);
    assert_eq!(client.incr("n").await.unwrap(), 2);
}

#[tokio::test]
async fn test_merge_over_http() {
    let kv = Arc::new(MemoryKv::new());
    let base = spawn_server(kv.clone()).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/api/kv-merge", base))
        .json(&json!({
            "stateKey": "coralclub:state",
            "revKey": "coralclub:rev",
            "patch": { "brand": { "name": "Coral Norte" }, "promo": true }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["rev"], 1);
    assert_eq!(body["state"]["rev"], 1);
    assert_eq!(body["state"]["brand"]["name"], "Coral Norte");
    assert_eq!(body["state"]["promo"], true);
    assert_eq!(kv.peek("coralclub:rev").await, Some(json!(1)));
}

#[tokio::test]
async fn test_null_patch_is_empty_merge() {
    let kv = Arc::new(MemoryKv::new());
    kv.set("s", &serde_json::to_value(StateDocument::seed(2)).unwrap())
        .await
        .unwrap();

    let (status, body) = call(
        kv.clone(),
        "POST",
        "/api/kv-merge",
        r#"{"stateKey": "s", "revKey": "r"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["state"]["rev"], 1);
    assert_eq!(body["state"]["tents"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_replicas_sync_through_proxy() {
    let base = spawn_server(Arc::new(MemoryKv::new())).await;
    let transport = |base: &str| {
        Arc::new(ProxyTransport::new(
            ProxyKvClient::new(base),
            StateKeys::default(),
        ))
    };

    let a = Replica::new(transport(&base), ReplicaConfig::default());
    let b = Replica::new(transport(&base), ReplicaConfig::default());
    assert_eq!(a.bootstrap().await.unwrap(), 1);
    assert_eq!(b.bootstrap().await.unwrap(), 1);

    let manager = coral_club_core::ReservationManager::new(Arc::new(a));
    let (reservation, applied) = manager
        .reserve(3, coral_club_core::Customer::new("Eva", "555-0101"), vec![])
        .await
        .unwrap();
    assert!(!applied.is_local());

    assert!(b.poll_once().await.unwrap());
    let doc = b.snapshot().await;
    assert!(doc.find_reservation(&reservation.id).unwrap().is_pending());
    assert_eq!(
        doc.find_tent(3).unwrap().state,
        coral_club_core::TentState::Holding
    );
}
