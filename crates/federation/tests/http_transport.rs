//! `HttpTransport` against a live local server.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use fedinet_common::{AppError, config::FederationConfig};
use fedinet_core::{AckEnvelope, FederationTransport, InboxEnvelope, PushError};
use fedinet_federation::HttpTransport;
use serde_json::{Value, json};

type Received = Arc<Mutex<Vec<Value>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn transport(timeout_secs: u64) -> HttpTransport {
    let config: FederationConfig = serde_json::from_value(json!({
        "instance_name": "test",
        "request_timeout_secs": timeout_secs,
        "connect_timeout_secs": 1,
    }))
    .unwrap();
    HttpTransport::new(&config, "https://a.example").unwrap()
}

fn envelope() -> InboxEnvelope {
    serde_json::from_value(json!({
        "message_id": "m-1",
        "activity_type": "Follow",
        "actor": "alice",
        "actor_server": "https://a.example",
        "payload": {"object": "bob"}
    }))
    .unwrap()
}

async fn record(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
    received.lock().unwrap().push(body);
    StatusCode::OK
}

#[tokio::test]
async fn test_push_posts_envelope_to_inbox() {
    let received = Received::default();
    let server = serve(
        Router::new()
            .route("/federation/inbox", post(record))
            .with_state(received.clone()),
    )
    .await;

    transport(5).push(&server, &envelope()).await.unwrap();

    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["message_id"], "m-1");
    assert_eq!(bodies[0]["actor_server"], "https://a.example");
    assert_eq!(bodies[0]["payload"]["object"], "bob");
}

#[tokio::test]
async fn test_push_non_success_status() {
    let server = serve(Router::new().route(
        "/federation/inbox",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
    ))
    .await;

    let err = transport(5).push(&server, &envelope()).await.unwrap_err();

    assert!(matches!(err, PushError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_push_times_out() {
    let server = serve(Router::new().route(
        "/federation/inbox",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    ))
    .await;

    let err = transport(1).push(&server, &envelope()).await.unwrap_err();

    assert!(matches!(err, PushError::Timeout(_)));
}

#[tokio::test]
async fn test_push_to_closed_port() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = transport(2).push(&server, &envelope()).await.unwrap_err();

    assert!(matches!(err, PushError::Connect { .. }));
}

#[tokio::test]
async fn test_fetch_capabilities() {
    let server = serve(Router::new().route(
        "/federation/capabilities",
        get(|| async {
            Json(json!({
                "server_url": "https://b.example",
                "protocol_versions": ["1.0.0"],
                "supported_types": ["Follow", "Like"],
                "max_message_size": 65536,
                "supports_retries": true,
                "supports_acks": true
            }))
        }),
    ))
    .await;

    let doc = transport(5).fetch_capabilities(&server).await.unwrap();

    assert_eq!(doc.supported_types, vec!["Follow", "Like"]);
    assert_eq!(doc.max_message_size, 65536);
}

#[tokio::test]
async fn test_fetch_capabilities_failure() {
    let server = serve(Router::new()).await;

    let result = transport(5).fetch_capabilities(&server).await;

    assert!(matches!(result, Err(AppError::DiscoveryFailed(_))));
}

#[tokio::test]
async fn test_send_ack() {
    let received = Received::default();
    let server = serve(
        Router::new()
            .route("/federation/ack", post(record))
            .with_state(received.clone()),
    )
    .await;
    let ack: AckEnvelope = serde_json::from_value(json!({
        "message_id": "m-1",
        "status": "received",
        "receiver_server": "https://b.example"
    }))
    .unwrap();

    transport(5).send_ack(&server, &ack).await.unwrap();

    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies[0]["status"], "received");
}
