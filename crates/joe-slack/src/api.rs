// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Web API client.
//!
//! Only the methods the assistant needs. Slack answers 200 with
//! `{"ok": false, "error": "..."}` on failure, so every response body is
//! checked for `ok`.

use std::time::Duration;

use async_trait::async_trait;
use joe_core::types::UserInfo;
use joe_core::{JoeError, UserInformer};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

const SERVICE: &str = "slack";

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Identity of the bot token, from `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub user_id: String,
    pub team: String,
}

#[derive(Clone)]
pub struct SlackApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for SlackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApi")
            .field("base_url", &self.base_url)
            .field("token", &"[redacted]")
            .finish()
    }
}

impl SlackApi {
    pub fn new(token: &str) -> Result<Self, JoeError> {
        Self::with_base_url(DEFAULT_API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self, JoeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                JoeError::integration(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn post(&self, method: &str, token: &str, body: &Value) -> Result<Value, JoeError> {
        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| JoeError::integration(SERVICE, format!("{method} failed: {e}")))?;
        decode(method, response).await
    }

    async fn get(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, JoeError> {
        let url = Url::parse_with_params(&self.method_url(method), params)
            .map_err(|e| JoeError::integration(SERVICE, format!("invalid {method} url: {e}")))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| JoeError::integration(SERVICE, format!("{method} failed: {e}")))?;
        decode(method, response).await
    }

    pub async fn auth_test(&self) -> Result<AuthInfo, JoeError> {
        let value = self.post("auth.test", &self.token, &json!({})).await?;
        Ok(AuthInfo {
            user_id: string_field(&value, "user_id"),
            team: string_field(&value, "team"),
        })
    }

    /// Posts a message and returns its `ts`.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, JoeError> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = json!(ts);
        }
        let value = self.post("chat.postMessage", &self.token, &body).await?;
        required_field(&value, "chat.postMessage", "ts")
    }

    pub async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<(), JoeError> {
        let body = json!({ "channel": channel, "ts": ts, "text": text });
        self.post("chat.update", &self.token, &body).await?;
        Ok(())
    }

    /// Posts a message only `user` can see and returns its `message_ts`.
    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, JoeError> {
        let mut body = json!({ "channel": channel, "user": user, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = json!(ts);
        }
        let value = self.post("chat.postEphemeral", &self.token, &body).await?;
        Ok(string_field(&value, "message_ts"))
    }

    pub async fn add_reaction(&self, channel: &str, ts: &str, name: &str) -> Result<(), JoeError> {
        let body = json!({ "channel": channel, "timestamp": ts, "name": name });
        self.post("reactions.add", &self.token, &body).await?;
        Ok(())
    }

    pub async fn remove_reaction(&self, channel: &str, ts: &str, name: &str) -> Result<(), JoeError> {
        let body = json!({ "channel": channel, "timestamp": ts, "name": name });
        self.post("reactions.remove", &self.token, &body).await?;
        Ok(())
    }

    /// Uploads a text file into a thread and returns its permalink.
    pub async fn upload_file(
        &self,
        channel: &str,
        thread_ts: &str,
        title: &str,
        content: &str,
    ) -> Result<String, JoeError> {
        let length = content.len().to_string();
        let ticket = self
            .get(
                "files.getUploadURLExternal",
                &[("filename", title), ("length", &length)],
            )
            .await?;
        let upload_url = required_field(&ticket, "files.getUploadURLExternal", "upload_url")?;
        let file_id = required_field(&ticket, "files.getUploadURLExternal", "file_id")?;

        let response = self
            .client
            .post(&upload_url)
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| JoeError::integration(SERVICE, format!("file upload failed: {e}")))?;
        if !response.status().is_success() {
            return Err(JoeError::integration(
                SERVICE,
                format!("file upload returned {}", response.status()),
            ));
        }

        let mut body = json!({
            "files": [{ "id": file_id, "title": title }],
            "channel_id": channel,
        });
        if !thread_ts.is_empty() {
            body["thread_ts"] = json!(thread_ts);
        }
        let done = self
            .post("files.completeUploadExternal", &self.token, &body)
            .await?;
        let permalink = done
            .get("files")
            .and_then(|files| files.get(0))
            .map(|file| string_field(file, "permalink"))
            .unwrap_or_default();
        debug!(file_id = file_id.as_str(), title, "file uploaded");
        Ok(permalink)
    }

    /// Fetches a private file body, e.g. a shared snippet.
    pub async fn download(&self, url: &str) -> Result<String, JoeError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| JoeError::integration(SERVICE, format!("download failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(JoeError::integration(
                SERVICE,
                format!("download returned {status}"),
            ));
        }
        response
            .text()
            .await
            .map_err(|e| JoeError::integration(SERVICE, format!("failed to read download: {e}")))
    }

    /// Opens a socket mode connection with an app-level token and returns its `wss://` url.
    pub async fn open_connection(&self, app_token: &str) -> Result<String, JoeError> {
        let value = self
            .post("apps.connections.open", app_token, &json!({}))
            .await?;
        required_field(&value, "apps.connections.open", "url")
    }
}

#[async_trait]
impl UserInformer for SlackApi {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo, JoeError> {
        let value = self.get("users.info", &[("user", user_id)]).await?;
        let user = value.get("user").cloned().unwrap_or_default();
        let profile = user.get("profile").cloned().unwrap_or_default();

        let mut display_name = string_field(&profile, "display_name");
        if display_name.is_empty() {
            display_name = string_field(&user, "name");
        }
        let mut real_name = string_field(&profile, "real_name");
        if real_name.is_empty() {
            real_name = string_field(&user, "real_name");
        }

        Ok(UserInfo {
            id: user_id.to_string(),
            display_name,
            real_name,
        })
    }
}

async fn decode(method: &str, response: reqwest::Response) -> Result<Value, JoeError> {
    let status = response.status();
    let text = response.text().await.map_err(|e| {
        JoeError::integration(SERVICE, format!("failed to read {method} response: {e}"))
    })?;
    debug!(%status, method, "slack response received");

    let value: Value = serde_json::from_str(&text).map_err(|e| {
        JoeError::integration(
            SERVICE,
            format!("{method} returned {status} with unparsable body: {e}"),
        )
    })?;
    if value.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(JoeError::integration(SERVICE, format!("{method}: {error}")));
    }
    Ok(value)
}

fn string_field(value: &Value, name: &str) -> String {
    value
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn required_field(value: &Value, method: &str, name: &str) -> Result<String, JoeError> {
    let field = string_field(value, name);
    if field.is_empty() {
        return Err(JoeError::integration(
            SERVICE,
            format!("{method} response has no `{name}`"),
        ));
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let api = SlackApi::new("xoxb-secret").unwrap();
        let debug = format!("{api:?}");
        assert!(!debug.contains("xoxb-secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn required_field_reports_missing_value() {
        let err = required_field(&json!({"ok": true}), "chat.postMessage", "ts").unwrap_err();
        assert_eq!(
            err.to_string(),
            "slack error: chat.postMessage response has no `ts`"
        );
    }
}
