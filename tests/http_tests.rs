// Integration tests for the HTTP control API
//
// Requests go straight through the router with tower's `oneshot`.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use callwaiting_voice::error::MicrophoneError;
use callwaiting_voice::http::{create_router, AppState};
use callwaiting_voice::session::{CallConfig, CallSessionController, ControllerOptions};
use common::{MicBehaviour, MockMicrophone, MockTransport};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(transport: &Arc<MockTransport>, mic: &Arc<MockMicrophone>) -> Router {
    let controller = Arc::new(CallSessionController::new(
        transport.clone(),
        mic.clone(),
        ControllerOptions::default(),
    ));
    create_router(AppState::new(
        controller,
        CallConfig::for_assistant("asst-default"),
    ))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, value))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let app = app(&MockTransport::new(), &MockMicrophone::granting());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&body[..], b"OK");
    Ok(())
}

#[tokio::test]
async fn test_call_lifecycle() -> Result<()> {
    let transport = MockTransport::new();
    let app = app(&transport, &MockMicrophone::granting());

    let (status, session) = send(&app, "POST", "/call/start", Some(json!({"voice": "vapi-harry"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], "active");
    assert_eq!(transport.configs()[0].voice(), Some(&json!("vapi-harry")));
    assert_eq!(
        transport.configs()[0].get("assistantId"),
        Some(&json!("asst-default"))
    );

    let (status, body) = send(&app, "POST", "/call/start", None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "already_in_progress");

    let (status, body) = send(&app, "POST", "/call/mute", Some(json!({"muted": true}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);

    let (status, stats) = send(&app, "GET", "/call/status", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["state"], "active");
    assert_eq!(stats["muted"], true);
    assert_eq!(stats["quality_score"], 100);

    let (_, transcript) = send(&app, "GET", "/call/transcript", None).await?;
    assert_eq!(transcript, json!([]));

    let (status, session) = send(&app, "POST", "/call/end", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], "idle");
    assert_eq!(transport.stops(), 1);

    Ok(())
}

#[tokio::test]
async fn test_start_without_body_uses_defaults() -> Result<()> {
    let transport = MockTransport::new();
    let app = app(&transport, &MockMicrophone::granting());

    let (status, _) = send(&app, "POST", "/call/start", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(transport.configs()[0], CallConfig::for_assistant("asst-default"));
    Ok(())
}

#[tokio::test]
async fn test_permission_denied_maps_to_forbidden() -> Result<()> {
    let mic = MockMicrophone::new(MicBehaviour::Deny(MicrophoneError::PermissionDenied(
        "NotAllowedError".to_string(),
    )));
    let app = app(&MockTransport::new(), &mic);

    let (status, body) = send(&app, "POST", "/call/start", None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");

    let (_, session) = send(&app, "GET", "/call/session", None).await?;
    assert_eq!(session["state"], "failed");
    assert_eq!(session["last_error"]["kind"], "permission_denied");

    let (status, session) = send(&app, "POST", "/call/reset", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], "idle");
    Ok(())
}

#[tokio::test]
async fn test_signals_endpoint() -> Result<()> {
    let app = app(&MockTransport::new(), &MockMicrophone::granting());

    let (status, signals) = send(&app, "GET", "/call/signals", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(signals["emotion"]["tag"], "neutral");
    assert_eq!(signals["last_latency_ms"], Value::Null);
    Ok(())
}
