// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Database Lab clone API.
//!
//! Clone creation and reset are asynchronous on the server side; the client
//! polls the clone until its status is `OK` before returning.

use std::time::Duration;

use async_trait::async_trait;
use joe_core::types::{CloneInfo, CreateCloneRequest};
use joe_core::{DblabClient, JoeError};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::types::{ApiClone, ApiError, CreateCloneBody, DbCredentials};

const SERVICE: &str = "dblab";

/// Header carrying the instance token.
const TOKEN_HEADER: &str = "Verification-Token";

/// Statuses after which a clone never becomes usable.
const TERMINAL_STATUSES: &[&str] = &["FATAL", "DELETING"];

/// Client for one Database Lab instance.
#[derive(Clone)]
pub struct HttpDblabClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl std::fmt::Debug for HttpDblabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDblabClient")
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("ready_timeout", &self.ready_timeout)
            .finish()
    }
}

impl HttpDblabClient {
    /// Creates a client for the instance at `base_url`.
    pub fn new(base_url: &str, token: &str) -> Result<Self, JoeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            TOKEN_HEADER,
            HeaderValue::from_str(token)
                .map_err(|e| JoeError::Config(format!("invalid dblab token header value: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| JoeError::integration(SERVICE, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(15 * 60),
        })
    }

    /// Overrides how often and how long a pending clone is polled.
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.ready_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, JoeError> {
        let mut request = self.client.request(method.clone(), self.endpoint(path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            JoeError::integration(SERVICE, format!("{method} {path} failed: {e}"))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            JoeError::integration(SERVICE, format!("failed to read response body: {e}"))
        })?;
        debug!(%status, %method, path, "dblab response received");

        if status.is_success() {
            return Ok(text);
        }
        Err(api_error(status, &text))
    }

    async fn fetch_clone(&self, clone_id: &str) -> Result<CloneInfo, JoeError> {
        let body = self
            .send(Method::GET, &format!("clone/{clone_id}"), None)
            .await?;
        parse_clone(&body)
    }

    /// Polls until the clone is `OK`, fails on terminal statuses or timeout.
    async fn wait_ready(&self, mut clone: CloneInfo) -> Result<CloneInfo, JoeError> {
        let deadline = tokio::time::Instant::now() + self.ready_timeout;

        loop {
            if clone.is_ok() {
                return Ok(clone);
            }
            if TERMINAL_STATUSES
                .iter()
                .any(|s| clone.status.eq_ignore_ascii_case(s))
            {
                return Err(JoeError::session(format!(
                    "clone {} entered status {}",
                    clone.id, clone.status
                )));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(JoeError::session(format!(
                    "clone {} is not ready after {}s (status {})",
                    clone.id,
                    self.ready_timeout.as_secs(),
                    clone.status
                )));
            }

            debug!(clone_id = %clone.id, status = %clone.status, "waiting for clone");
            tokio::time::sleep(self.poll_interval).await;
            clone = self.fetch_clone(&clone.id).await?;
        }
    }
}

fn parse_clone(body: &str) -> Result<CloneInfo, JoeError> {
    serde_json::from_str::<ApiClone>(body)
        .map(ApiClone::into_clone)
        .map_err(|e| JoeError::integration(SERVICE, format!("failed to parse clone: {e}")))
}

fn api_error(status: StatusCode, body: &str) -> JoeError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(err) if !err.message.is_empty() => {
            if err.detail.is_empty() {
                format!("{} ({status}): {}", err.code, err.message)
            } else {
                format!("{} ({status}): {}. {}", err.code, err.message, err.detail)
            }
        }
        _ => format!("API returned {status}: {body}"),
    };
    JoeError::integration(SERVICE, message)
}

#[async_trait]
impl DblabClient for HttpDblabClient {
    async fn create_clone(&self, req: &CreateCloneRequest) -> Result<CloneInfo, JoeError> {
        let body = CreateCloneBody {
            id: &req.id,
            protected: req.protected,
            db: DbCredentials {
                username: &req.username,
                password: &req.password,
            },
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| JoeError::Internal(format!("failed to encode clone request: {e}")))?;

        let created = self.send(Method::POST, "clone", Some(body)).await?;
        let clone = parse_clone(&created)?;
        debug!(clone_id = %clone.id, status = %clone.status, "clone requested");

        self.wait_ready(clone).await
    }

    async fn get_clone(&self, clone_id: &str) -> Result<CloneInfo, JoeError> {
        self.fetch_clone(clone_id).await
    }

    async fn reset_clone(&self, clone_id: &str) -> Result<(), JoeError> {
        self.send(
            Method::POST,
            &format!("clone/{clone_id}/reset"),
            Some(serde_json::json!({})),
        )
        .await?;

        let clone = self.fetch_clone(clone_id).await?;
        self.wait_ready(clone).await.map(|_| ())
    }

    async fn destroy_clone(&self, clone_id: &str) -> Result<(), JoeError> {
        self.send(Method::DELETE, &format!("clone/{clone_id}"), None)
            .await
            .map(|_| ())
    }

    fn url(&self) -> &str {
        &self.base_url
    }
}
