// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Web API client and messenger against a mock Slack.

use std::sync::Arc;

use joe_core::types::{Message, MessageKind, MessageStatus};
use joe_core::{Messenger, UserInformer};
use joe_slack::{SlackApi, SlackMessenger};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> SlackApi {
    SlackApi::with_base_url(&format!("{}/api", server.uri()), "xoxb-test").unwrap()
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    let mut body = body;
    body["ok"] = json!(true);
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn post_message_returns_ts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_partial_json(json!({"channel": "C1", "text": "hello", "thread_ts": "1.1"})))
        .respond_with(ok(json!({"ts": "1.2"})))
        .expect(1)
        .mount(&server)
        .await;

    let ts = api(&server)
        .post_message("C1", "hello", Some("1.1"))
        .await
        .unwrap();
    assert_eq!(ts, "1.2");
}

#[tokio::test]
async fn not_ok_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
        )
        .mount(&server)
        .await;

    let err = api(&server)
        .post_message("C404", "hello", None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "slack error: chat.postMessage: channel_not_found"
    );
}

#[tokio::test]
async fn users_info_prefers_profile_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users.info"))
        .and(query_param("user", "U1"))
        .respond_with(ok(json!({
            "user": {
                "id": "U1",
                "name": "alice",
                "profile": {"display_name": "", "real_name": "Alice Doe"}
            }
        })))
        .mount(&server)
        .await;

    let info = api(&server).user_info("U1").await.unwrap();
    assert_eq!(info.id, "U1");
    assert_eq!(info.display_name, "alice");
    assert_eq!(info.real_name, "Alice Doe");
}

#[tokio::test]
async fn upload_goes_through_external_upload_flow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/files.getUploadURLExternal"))
        .and(query_param("filename", "plan-text"))
        .and(query_param("length", "17"))
        .respond_with(ok(json!({
            "upload_url": format!("{}/upload/F1", server.uri()),
            "file_id": "F1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/F1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK - 17"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/files.completeUploadExternal"))
        .and(body_partial_json(json!({
            "files": [{"id": "F1", "title": "plan-text"}],
            "channel_id": "C1",
            "thread_ts": "1.2"
        })))
        .respond_with(ok(json!({
            "files": [{"id": "F1", "permalink": "https://slack.test/files/F1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let link = api(&server)
        .upload_file("C1", "1.2", "plan-text", "Seq Scan on users")
        .await
        .unwrap();
    assert_eq!(link, "https://slack.test/files/F1");
}

#[tokio::test]
async fn status_changes_swap_reactions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .respond_with(ok(json!({"ts": "1.2"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/reactions.add"))
        .and(body_partial_json(json!({"name": "hourglass_flowing_sand", "timestamp": "1.2"})))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/reactions.remove"))
        .and(body_partial_json(json!({"name": "hourglass_flowing_sand"})))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/reactions.add"))
        .and(body_partial_json(json!({"name": "white_check_mark"})))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let messenger = SlackMessenger::new(Arc::new(api(&server)));
    let mut msg = Message::new("C1", "U1", "explain select 1");
    messenger.publish(&mut msg).await.unwrap();
    assert_eq!(msg.message_id, "1.2");

    messenger
        .update_status(&mut msg, MessageStatus::Running)
        .await
        .unwrap();
    messenger.ok(&mut msg, chrono::Utc::now()).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Ok);
}

#[tokio::test]
async fn ephemeral_messages_are_not_edited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat.postEphemeral"))
        .and(body_partial_json(json!({"channel": "C1", "user": "U1"})))
        .respond_with(ok(json!({"message_ts": "1.3"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat.update"))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let messenger = SlackMessenger::new(Arc::new(api(&server)));
    let mut msg = Message::new("C1", "U1", "hint").with_kind(MessageKind::Ephemeral);
    messenger.publish(&mut msg).await.unwrap();
    messenger.update_text(&msg).await.unwrap();
    messenger
        .update_status(&mut msg, MessageStatus::Error)
        .await
        .unwrap();
}

#[tokio::test]
async fn socket_mode_connection_uses_app_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/apps.connections.open"))
        .and(header("authorization", "Bearer xapp-test"))
        .respond_with(ok(json!({"url": "wss://wss.slack.test/link"})))
        .expect(1)
        .mount(&server)
        .await;

    let url = api(&server).open_connection("xapp-test").await.unwrap();
    assert_eq!(url, "wss://wss.slack.test/link");
}
