//! Ingress integration tests: the full router over in-memory
//! collaborators.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use gantry_api::{router, AppState, WebhookSecrets};
use gantry_core::TenantId;
use gantry_engine::{Engine, EngineConfig};
use gantry_events::{EventBus, MemoryEventStore};
use gantry_queue::{JobQueue, LaneMap};
use gantry_storage::{
    MemoryExecutionRepository, MemoryScheduledEventRepository, MemoryWorkflowRepository,
};
use gantry_strategy::StrategyRegistry;
use hmac::{Hmac, Mac};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

struct Harness {
    app: Router,
    tenant: TenantId,
}

fn harness() -> Harness {
    let tenant = TenantId::v4();
    let store = Arc::new(MemoryEventStore::new());
    let bus = Arc::new(EventBus::new(store));
    let queue = JobQueue::new(LaneMap::builtin());
    let strategies = Arc::new(StrategyRegistry::with_builtins());
    let workflows = Arc::new(MemoryWorkflowRepository::new());
    let executions = Arc::new(MemoryExecutionRepository::new());
    let schedules = Arc::new(MemoryScheduledEventRepository::new());

    let engine = Engine::new(
        queue,
        bus,
        strategies.clone(),
        workflows.clone(),
        executions.clone(),
        EngineConfig::default(),
    );
    engine.start();

    let state = AppState {
        engine,
        workflows,
        executions,
        schedules,
        strategies,
        webhook_secrets: Arc::new(
            WebhookSecrets::new()
                .with("slack", tenant, "slack-secret")
                .with("whatsapp", tenant, "meta-secret"),
        ),
    };
    Harness { app: router(state), tenant }
}

impl Harness {
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-tenant-id", self.tenant.to_string());
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };
        (status, value)
    }

    async fn raw_request(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }
}

fn linear_workflow_body() -> Value {
    json!({
        "name": "double-and-deliver",
        "nodes": [
            {
                "id": "n1",
                "type": "transform",
                "name": "double",
                "config": {"transformation_type": "map", "template": "data.v * 2"},
            },
            {"id": "n2", "type": "webhook", "name": "deliver"},
        ],
        "edges": [{"source": "n1", "target": "n2"}],
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_publish_trigger_and_list() {
    let h = harness();

    let (status, body) = h.request("POST", "/workflows", Some(linear_workflow_body())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = h.request("POST", &format!("/workflows/{id}/publish"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .request("POST", "/nodes/n1/trigger", Some(json!({"input": {"v": 3}})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["trigger_id"].is_string());
    assert!(body["execution_id"].is_string());

    // Poll the runs listing until the run lands as completed.
    let mut last = Value::Null;
    for _ in 0..200 {
        let (status, runs) = h
            .request("GET", &format!("/workflows/{id}/executions"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        if runs[0]["state"] == json!("completed") {
            last = runs;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last[0]["state"], json!("completed"), "run never completed");

    let (status, nodes) = h.request("GET", "/nodes/n2/executions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(nodes[0]["output"], json!(6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_graph_is_rejected() {
    let h = harness();
    let body = json!({
        "name": "cyclic",
        "nodes": [
            {"id": "a", "type": "webhook", "name": "a"},
            {"id": "b", "type": "webhook", "name": "b"},
        ],
        "edges": [
            {"source": "a", "target": "b"},
            {"source": "b", "target": "a"},
        ],
    });
    let (status, response) = h.request("POST", "/workflows", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("entry"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_node_config_is_rejected() {
    let h = harness();
    let body = json!({
        "name": "bad-http",
        "nodes": [{"id": "h", "type": "http", "name": "h", "config": {}}],
        "edges": [],
    });
    let (status, response) = h.request("POST", "/workflows", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("url"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_node_type_is_rejected() {
    let h = harness();
    let body = json!({
        "name": "mystery",
        "nodes": [{"id": "x", "type": "teleport", "name": "x"}],
        "edges": [],
    });
    let (status, _) = h.request("POST", "/workflows", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_twice_conflicts() {
    let h = harness();
    let (_, body) = h.request("POST", "/workflows", Some(linear_workflow_body())).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = h.request("POST", &format!("/workflows/{id}/publish"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.request("POST", &format!("/workflows/{id}/publish"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_bumps_version() {
    let h = harness();
    let (_, body) = h.request("POST", "/workflows", Some(linear_workflow_body())).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .request(
            "PUT",
            &format!("/workflows/{id}"),
            Some(json!({"name": "renamed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], json!(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_tenant_header_is_a_validation_error() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/workflows")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(linear_workflow_body().to_string()))
        .unwrap();
    let (status, _) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trigger_for_unknown_node_is_not_found() {
    let h = harness();
    let (status, _) = h
        .request("POST", "/nodes/ghost/trigger", Some(json!({"input": {}})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_crud_and_fire() {
    let h = harness();
    let (_, body) = h.request("POST", "/workflows", Some(linear_workflow_body())).await;
    let workflow_id = body["id"].as_str().unwrap().to_string();
    h.request("POST", &format!("/workflows/{workflow_id}/publish"), None).await;

    let tenant = h.tenant;
    let (status, body) = h
        .request(
            "POST",
            &format!("/scheduler/{tenant}/events"),
            Some(json!({
                "workflow_id": workflow_id,
                "node": "n1",
                "data": {"v": 4},
                "schedule": {"cron": "0 * * * *", "timezone": "UTC"},
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let event_id = body["id"].as_str().unwrap().to_string();

    let (status, listed) = h
        .request("GET", &format!("/scheduler/{tenant}/events?status=active"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert!(listed[0]["next_run"].is_string());

    let (status, patched) = h
        .request(
            "PATCH",
            &format!("/scheduler/{tenant}/events/{event_id}/status"),
            Some(json!({"status": "paused"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["status"], json!("paused"));

    let (status, fired) = h
        .request(
            "POST",
            &format!("/scheduler/{tenant}/events/{event_id}/trigger"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fired["fired"], json!(true));

    let (status, listed) = h
        .request("GET", &format!("/scheduler/{tenant}/events"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed[0]["last_run"].is_string());

    let (status, _) = h
        .request("GET", &format!("/scheduler/{}/events", TenantId::v4()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_cron_is_rejected() {
    let h = harness();
    let (_, body) = h.request("POST", "/workflows", Some(linear_workflow_body())).await;
    let workflow_id = body["id"].as_str().unwrap().to_string();
    let tenant = h.tenant;

    let (status, _) = h
        .request(
            "POST",
            &format!("/scheduler/{tenant}/events"),
            Some(json!({
                "workflow_id": workflow_id,
                "node": "n1",
                "schedule": {"cron": "every tuesday"},
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Webhooks ────────────────────────────────────────────────────────────

fn slack_signed_headers(secret: &str, timestamp: i64, body: &[u8]) -> (String, String) {
    let basestring = [b"v0:".as_slice(), timestamp.to_string().as_bytes(), b":", body].concat();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(&basestring);
    let signature = format!("v0={}", hex::encode(mac.finalize().into_bytes()));
    (signature, timestamp.to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn meta_get_challenge_echoes() {
    let h = harness();
    let tenant = h.tenant;
    let workflow = uuid::Uuid::new_v4();
    let request = Request::builder()
        .method("GET")
        .uri(format!(
            "/webhooks/whatsapp/{tenant}/{workflow}?hub.mode=subscribe&hub.challenge=12345&hub.verify_token=t"
        ))
        .body(Body::empty())
        .unwrap();
    let (status, body) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"12345");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slack_url_verification_roundtrips() {
    let h = harness();
    let tenant = h.tenant;
    let workflow = uuid::Uuid::new_v4();
    let body = json!({"type": "url_verification", "challenge": "ch-77"}).to_string();
    let (signature, timestamp) =
        slack_signed_headers("slack-secret", Utc::now().timestamp(), body.as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhooks/slack/{tenant}/{workflow}"))
        .header("x-slack-signature", signature)
        .header("x-slack-request-timestamp", timestamp)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, response) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(response["challenge"], json!("ch-77"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slack_event_triggers_the_workflow_entry() {
    let h = harness();
    let (_, created) = h.request("POST", "/workflows", Some(linear_workflow_body())).await;
    let workflow_id = created["id"].as_str().unwrap().to_string();
    h.request("POST", &format!("/workflows/{workflow_id}/publish"), None).await;

    let tenant = h.tenant;
    let body = json!({
        "type": "event_callback",
        "event": {"type": "message", "user": "U1", "text": "hi", "ts": "1700000000.000100"},
    })
    .to_string();
    let (signature, timestamp) =
        slack_signed_headers("slack-secret", Utc::now().timestamp(), body.as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhooks/slack/{tenant}/{workflow_id}"))
        .header("x-slack-signature", signature)
        .header("x-slack-request-timestamp", timestamp)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, response) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(response["event_type"], json!("message"));
    assert!(response["trigger_id"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tampered_slack_signature_is_unauthorized() {
    let h = harness();
    let tenant = h.tenant;
    let workflow = uuid::Uuid::new_v4();
    let body = json!({"type": "event_callback"}).to_string();
    let (signature, timestamp) =
        slack_signed_headers("slack-secret", Utc::now().timestamp(), b"different body");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhooks/slack/{tenant}/{workflow}"))
        .header("x-slack-signature", signature)
        .header("x-slack-request-timestamp", timestamp)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_provider_is_not_found() {
    let h = harness();
    let tenant = h.tenant;
    let workflow = uuid::Uuid::new_v4();
    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhooks/telegram/{tenant}/{workflow}"))
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn provider_without_a_secret_is_unauthorized() {
    let h = harness();
    let tenant = h.tenant;
    let workflow = uuid::Uuid::new_v4();
    // Twitter has no secret registered in this harness.
    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhooks/twitter/{tenant}/{workflow}"))
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = h.raw_request(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
