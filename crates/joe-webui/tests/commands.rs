// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed commands through the web UI router.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use joe_agent::{Assistant, BasicPlanAnalyzer, EditionPack, EngineDeps};
use joe_config::JoeConfig;
use joe_config::model::{ChannelConfig, CredentialsConfig, DblabParamsConfig, WorkspaceConfig};
use joe_core::ManualClock;
use joe_core::types::MessageStatus;
use joe_test_utils::{MockConnectionFactory, MockDblab, MockPlatform, MockPsql};
use joe_webui::signature::{SIGNATURE_HEADER, sign};
use joe_webui::{WebUiAssistant, command_router};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const SECRET: &str = "webui-secret";

fn workspace(secret: Option<&str>) -> WorkspaceConfig {
    WorkspaceConfig {
        name: "console".into(),
        credentials: CredentialsConfig {
            signing_secret: secret.map(str::to_string),
            ..CredentialsConfig::default()
        },
        channels: vec![channel()],
    }
}

fn channel() -> ChannelConfig {
    ChannelConfig {
        channel_id: "ProductionDB".into(),
        project: "demo".into(),
        dblab_server: "prod1".into(),
        dblab_params: DblabParamsConfig::default(),
    }
}

fn engine(platform: &Arc<MockPlatform>) -> EngineDeps {
    let start = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
    EngineDeps {
        platform: Some(platform.clone()),
        connections: Arc::new(MockConnectionFactory::new()),
        analyzer: Arc::new(BasicPlanAnalyzer),
        psql: Arc::new(MockPsql::new()),
        edition: EditionPack::community(),
        clock: Arc::new(ManualClock::new(start)),
    }
}

async fn assistant(platform: &Arc<MockPlatform>) -> Arc<WebUiAssistant> {
    let assistant = WebUiAssistant::new(
        Arc::new(JoeConfig::default()),
        workspace(Some(SECRET)),
        engine(platform),
        CancellationToken::new(),
    )
    .unwrap();
    assistant.init().await.unwrap();
    assistant
        .add_channel(&channel(), Arc::new(MockDblab::new()))
        .await
        .unwrap();
    Arc::new(assistant)
}

fn command(text: &str, channel_id: &str) -> String {
    serde_json::json!({
        "session_id": "S1",
        "command_id": "K1",
        "text": text,
        "channel_id": channel_id,
        "user_id": "U1",
        "timestamp": "2026-10-01T12:00:00Z",
    })
    .to_string()
}

fn signed(body: String, signature: &str) -> Request<Body> {
    Request::post("/webui/commands")
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn signed_help_is_answered_through_the_platform() {
    let platform = Arc::new(MockPlatform::new());
    let assistant = assistant(&platform).await;

    let body = command("help", "ProductionDB");
    let signature = sign(SECRET, body.as_bytes());
    let response = command_router(assistant.clone())
        .oneshot(signed(body, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let tasks = assistant.processors().tasks();
    tasks.close();
    tasks.wait().await;

    let messages = platform.messages();
    assert!(!messages.is_empty());
    assert!(messages.iter().all(|m| m.session_id == "S1" && m.command_id == "K1"));
    assert!(messages.iter().any(|m| m.text.contains("`explain`")));
    assert!(platform.sessions().is_empty());
    assert_ne!(messages.last().unwrap().status, MessageStatus::Error);
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let platform = Arc::new(MockPlatform::new());
    let assistant = assistant(&platform).await;

    let body = command("help", "ProductionDB");
    let signature = sign("wrong-secret", body.as_bytes());
    let response = command_router(assistant)
        .oneshot(signed(body, &signature))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(platform.messages().is_empty());
}

#[tokio::test]
async fn unknown_channel_is_not_found() {
    let platform = Arc::new(MockPlatform::new());
    let assistant = assistant(&platform).await;

    let body = command("help", "StagingDB");
    let signature = sign(SECRET, body.as_bytes());
    let response = command_router(assistant)
        .oneshot(signed(body, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let platform = Arc::new(MockPlatform::new());
    let assistant = assistant(&platform).await;

    let body = r#"{"text":"help"}"#.to_string();
    let signature = sign(SECRET, body.as_bytes());
    let response = command_router(assistant)
        .oneshot(signed(body, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("malformed"));
}

#[tokio::test]
async fn channels_register_and_release_instances() {
    let platform = Arc::new(MockPlatform::new());
    let assistant = assistant(&platform).await;

    assert_eq!(
        platform.instances(),
        vec![("demo".to_string(), "https://dblab.test".to_string())]
    );
    assert_eq!(assistant.instance_ids().await, vec!["instance-1".to_string()]);
    let service = assistant.processors().get("ProductionDB").await.unwrap();
    assert_eq!(
        service.config().platform_instance_id.as_deref(),
        Some("instance-1")
    );

    assistant.deregister().await.unwrap();
    assert_eq!(platform.destroyed_instances(), vec!["instance-1".to_string()]);
    assert!(assistant.instance_ids().await.is_empty());
}

#[tokio::test]
async fn init_requires_signing_secret() {
    let platform = Arc::new(MockPlatform::new());
    let assistant = WebUiAssistant::new(
        Arc::new(JoeConfig::default()),
        workspace(None),
        engine(&platform),
        CancellationToken::new(),
    )
    .unwrap();
    assert!(matches!(
        assistant.init().await,
        Err(joe_core::JoeError::Config(_))
    ));
}

#[tokio::test]
async fn platform_is_required() {
    let platform = Arc::new(MockPlatform::new());
    let mut deps = engine(&platform);
    deps.platform = None;
    let result = WebUiAssistant::new(
        Arc::new(JoeConfig::default()),
        workspace(Some(SECRET)),
        deps,
        CancellationToken::new(),
    );
    assert!(result.is_err());
}
