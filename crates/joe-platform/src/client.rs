// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the platform `/rpc/joe_*` procedures.
//!
//! Every procedure answers with a JSON object. A non-empty `code` or `message`
//! field means the call failed even when the HTTP status is 2xx.

use std::time::Duration;

use async_trait::async_trait;
use joe_core::types::{
    ArtifactLink, CommandPosted, CommandRecord, PlatformArtifact, PlatformMessage,
    PlatformSession,
};
use joe_core::{JoeError, PlatformClient};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

const SERVICE: &str = "platform";

const TOKEN_HEADER: &str = "Access-Token";

/// Platform RPC client.
#[derive(Clone)]
pub struct HttpPlatformClient {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for HttpPlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPlatformClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpPlatformClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, JoeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            TOKEN_HEADER,
            HeaderValue::from_str(token).map_err(|e| {
                JoeError::Config(format!("invalid platform token header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                JoeError::integration(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Calls `/rpc/{procedure}` and returns the decoded response object.
    async fn call(&self, procedure: &str, body: &Value) -> Result<Value, JoeError> {
        let url = format!("{}/rpc/{procedure}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| JoeError::integration(SERVICE, format!("{procedure} failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            JoeError::integration(SERVICE, format!("failed to read {procedure} response: {e}"))
        })?;
        debug!(%status, procedure, "platform response received");

        let value: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text).map_err(|e| {
                JoeError::integration(
                    SERVICE,
                    format!("{procedure} returned {status} with unparsable body: {e}"),
                )
            })?
        };

        if let Some(err) = rpc_error(&value) {
            return Err(JoeError::integration(SERVICE, format!("{procedure}: {err}")));
        }
        if !status.is_success() {
            return Err(JoeError::integration(
                SERVICE,
                format!("{procedure} returned {status}: {text}"),
            ));
        }
        Ok(value)
    }
}

/// Extracts `code`/`message`/`hint`/`details` into one error text when present.
fn rpc_error(value: &Value) -> Option<String> {
    let field = |name: &str| value.get(name).and_then(Value::as_str).unwrap_or_default();
    let (code, message) = (field("code"), field("message"));
    if code.is_empty() && message.is_empty() {
        return None;
    }

    let mut text = match (code.is_empty(), message.is_empty()) {
        (false, false) => format!("{message} ({code})"),
        (true, _) => message.to_string(),
        (false, true) => code.to_string(),
    };
    for extra in ["hint", "details"] {
        let v = field(extra);
        if !v.is_empty() {
            text.push_str(&format!(". {v}"));
        }
    }
    Some(text)
}

/// Reads an id field that may be encoded as a number or a string.
fn id_field(value: &Value, name: &str) -> Result<String, JoeError> {
    match value.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(JoeError::integration(
            SERVICE,
            format!("response has no `{name}`"),
        )),
    }
}

fn optional_string(value: &Value, name: &str) -> String {
    value
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn create_session(&self, session: &PlatformSession) -> Result<String, JoeError> {
        let mut body = json!({
            "project_name": session.project,
            "user_id": session.user_id,
            "user_name": session.user_name,
            "channel_id": session.channel_id,
        });
        if let Some(instance) = &session.dblab_instance_id {
            body["dblab_instance_id"] = json!(instance);
        }
        let value = self.call("joe_session_create", &body).await?;
        id_field(&value, "session_id")
    }

    async fn post_command(&self, command: &CommandRecord) -> Result<CommandPosted, JoeError> {
        let body = json!({
            "session_id": command.session_id,
            "command": command.command,
            "query": command.query,
            "response": command.response,
            "plan_text": command.plan_text,
            "plan_json": command.plan_json,
            "plan_execution_text": command.plan_exec_text,
            "plan_execution_json": command.plan_exec_json,
            "recommendations": command.recommendations,
            "stats": command.stats,
            "error": command.error,
            "created_at": command.timestamp,
        });
        let value = self.call("joe_session_command_post", &body).await?;
        Ok(CommandPosted {
            command_id: id_field(&value, "command_id")?,
            permalink: optional_string(&value, "url"),
        })
    }

    async fn post_message(&self, message: &PlatformMessage) -> Result<String, JoeError> {
        let body = serde_json::to_value(message)
            .map_err(|e| JoeError::Internal(format!("failed to encode message: {e}")))?;
        let value = self.call("joe_message_post", &body).await?;
        id_field(&value, "message_id")
    }

    async fn post_artifact(&self, artifact: &PlatformArtifact) -> Result<ArtifactLink, JoeError> {
        let body = serde_json::to_value(artifact)
            .map_err(|e| JoeError::Internal(format!("failed to encode artifact: {e}")))?;
        let value = self.call("joe_message_artifact_post", &body).await?;
        Ok(ArtifactLink {
            id: id_field(&value, "artifact_id")?,
            permalink: optional_string(&value, "url"),
        })
    }

    async fn create_instance(&self, project: &str, url: &str) -> Result<String, JoeError> {
        let body = json!({ "project_name": project, "url": url });
        let value = self.call("joe_instance_create", &body).await?;
        id_field(&value, "instance_id")
    }

    async fn destroy_instance(&self, instance_id: &str) -> Result<(), JoeError> {
        self.call("joe_instance_destroy", &json!({ "instance_id": instance_id }))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joe_core::MessageStatus;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpPlatformClient {
        HttpPlatformClient::new(&format!("{}/api", server.uri()), "platform-token").unwrap()
    }

    #[tokio::test]
    async fn create_session_returns_numeric_id_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_session_create"))
            .and(header("Access-Token", "platform-token"))
            .and(body_partial_json(json!({"project_name": "demo", "user_id": "U1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_session(&PlatformSession {
                project: "demo".into(),
                user_id: "U1".into(),
                user_name: "alice".into(),
                channel_id: "C1".into(),
                dblab_instance_id: None,
            })
            .await
            .unwrap();
        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn command_post_maps_execution_fields_and_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_session_command_post"))
            .and(body_partial_json(json!({
                "session_id": "42",
                "command": "explain",
                "plan_execution_text": "Result (actual time=0.01..0.02)"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "command_id": 7,
                "url": "https://platform.example.com/demo/sessions/42/commands/7"
            })))
            .mount(&server)
            .await;

        let mut record = CommandRecord::new("explain", "select 1");
        record.session_id = "42".into();
        record.plan_exec_text = "Result (actual time=0.01..0.02)".into();

        let posted = client(&server).post_command(&record).await.unwrap();
        assert_eq!(posted.command_id, "7");
        assert!(posted.permalink.ends_with("/commands/7"));
    }

    #[tokio::test]
    async fn error_fields_fail_even_with_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_message_post"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "P0001",
                "message": "session not found",
                "hint": "create a session first"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_message(&PlatformMessage {
                session_id: "1".into(),
                command_id: "2".into(),
                message_id: None,
                text: "hello".into(),
                status: MessageStatus::Running,
            })
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("session not found"));
        assert!(text.contains("P0001"));
        assert!(text.contains("create a session first"));
    }

    #[tokio::test]
    async fn message_status_is_sent_lowercase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_message_post"))
            .and(body_partial_json(json!({"status": "running", "command_id": "2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m-1"})))
            .mount(&server)
            .await;

        let id = client(&server)
            .post_message(&PlatformMessage {
                session_id: "1".into(),
                command_id: "2".into(),
                message_id: None,
                text: "plan select 1".into(),
                status: MessageStatus::Running,
            })
            .await
            .unwrap();
        assert_eq!(id, "m-1");
    }

    #[tokio::test]
    async fn artifact_returns_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_message_artifact_post"))
            .and(body_partial_json(json!({"title": "plan-text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artifact_id": 3,
                "url": "https://platform.example.com/artifacts/3"
            })))
            .mount(&server)
            .await;

        let link = client(&server)
            .post_artifact(&PlatformArtifact {
                session_id: "1".into(),
                message_id: "m-1".into(),
                title: "plan-text".into(),
                content: "Seq Scan on t".into(),
            })
            .await
            .unwrap();
        assert_eq!(link.id, "3");
        assert_eq!(link.permalink, "https://platform.example.com/artifacts/3");
    }

    #[tokio::test]
    async fn instance_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_instance_create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"instance_id": 5})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/rpc/joe_instance_destroy"))
            .and(body_partial_json(json!({"instance_id": "5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let platform = client(&server);
        let id = platform
            .create_instance("demo", "https://dblab.example.com")
            .await
            .unwrap();
        assert_eq!(id, "5");
        platform.destroy_instance(&id).await.unwrap();
    }

    #[test]
    fn rpc_error_absent_for_plain_payload() {
        assert_eq!(rpc_error(&json!({"session_id": 1})), None);
        assert_eq!(
            rpc_error(&json!({"message": "boom"})).as_deref(),
            Some("boom")
        );
    }
}
