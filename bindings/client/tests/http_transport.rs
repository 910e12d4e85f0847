use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use control_plane_client::prelude::{
    ControlPlaneClient, ControlPlaneError, HttpTransport, PostRequest, Transport, TransportError,
};
use harness_bridge_model::RunContext;
use parking_lot::Mutex;
use serde_json::{json, Value};

#[derive(Default)]
struct Received {
    calls: Mutex<Vec<(Option<String>, Option<String>, Value)>>,
}

async fn start_server(received: Arc<Received>) -> String {
    async fn record(
        State(received): State<Arc<Received>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        received.calls.lock().push((
            header("x-locust-token"),
            header("content-type"),
            body,
        ));
        StatusCode::OK
    }

    async fn fail() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
    }

    async fn slow() -> StatusCode {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StatusCode::OK
    }

    let app = Router::new()
        .route("/v1/internal/locust/test-start", post(record))
        .route("/v1/internal/locust/metrics", post(fail))
        .route("/slow", post(slow))
        .with_state(received);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn sends_token_and_json_body() {
    let received = Arc::new(Received::default());
    let base_url = start_server(received.clone()).await;

    let client = ControlPlaneClient::new(base_url, "secret-token");
    client
        .notify_start(&RunContext::new("r1").with_tenant_id("t1"))
        .await
        .unwrap();

    let calls = received.calls.lock();
    assert_eq!(1, calls.len());
    let (token, content_type, body) = &calls[0];
    assert_eq!(Some("secret-token"), token.as_deref());
    assert_eq!(Some("application/json"), content_type.as_deref());
    assert_eq!(&json!({"runId": "r1", "tenantId": "t1", "envId": ""}), body);
}

#[tokio::test]
async fn non_success_status_carries_body() {
    let base_url = start_server(Arc::new(Received::default())).await;

    let client = ControlPlaneClient::new(base_url, "secret-token");
    let err = client
        .push_metrics(&RunContext::new("r1"), &Default::default())
        .await
        .unwrap_err();

    match err {
        ControlPlaneError::Status { status, body } => {
            assert_eq!(500, status);
            assert_eq!("database unavailable", body);
        }
        other => panic!("Unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn request_timeout_is_reported() {
    let base_url = start_server(Arc::new(Received::default())).await;

    let err = HttpTransport::new()
        .post_json(PostRequest {
            url: format!("{base_url}/slow"),
            token: "secret-token".to_string(),
            body: json!({}),
            timeout: Duration::from_millis(100),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Timeout(_)));
}
