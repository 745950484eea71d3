// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP endpoints of the web UI transport.
//!
//! - POST /webui/commands (signed by the platform)
//! - GET /webui/channels

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use joe_config::JoeConfig;
use joe_config::model::TRANSPORT_WEBUI;
use joe_core::types::IncomingMessage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assistant::WebUiAssistant;
use crate::signature::SIGNATURE_HEADER;

pub const COMMANDS_PATH: &str = "/webui/commands";
pub const CHANNELS_PATH: &str = "/webui/channels";

/// A command typed into the platform console.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub session_id: String,
    pub command_id: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub timestamp: String,
}

impl From<CommandRequest> for IncomingMessage {
    fn from(req: CommandRequest) -> Self {
        IncomingMessage {
            text: req.text,
            user_id: req.user_id,
            channel_id: req.channel_id,
            timestamp: req.timestamp,
            direct: true,
            session_id: Some(req.session_id),
            command_id: Some(req.command_id),
            ..IncomingMessage::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub channel_id: String,
    pub project: String,
    pub dblab_server: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Routes served for one web UI workspace.
pub fn command_router(assistant: Arc<WebUiAssistant>) -> Router {
    Router::new()
        .route(COMMANDS_PATH, post(post_command))
        .with_state(assistant)
}

async fn post_command(
    State(assistant): State<Arc<WebUiAssistant>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !assistant.verify(&body, signature) {
        warn!("web UI command rejected: bad signature");
        return error(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let request: CommandRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "malformed web UI command");
            return error(StatusCode::BAD_REQUEST, "malformed command");
        }
    };

    let channel_id = request.channel_id.clone();
    if !assistant.dispatch(request.into()).await {
        return error(StatusCode::NOT_FOUND, &format!("unknown channel {channel_id}"));
    }
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// Channels configured for the web UI, `None` when the transport is not configured.
pub fn webui_channels(config: &JoeConfig) -> Option<Vec<ChannelEntry>> {
    let workspaces = config.workspaces(TRANSPORT_WEBUI);
    if workspaces.is_empty() {
        return None;
    }
    Some(
        workspaces
            .iter()
            .flat_map(|ws| &ws.channels)
            .map(|ch| ChannelEntry {
                channel_id: ch.channel_id.clone(),
                project: ch.project.clone(),
                dblab_server: ch.dblab_server.clone(),
            })
            .collect(),
    )
}

/// GET /webui/channels, answering 404 when the web UI is not configured.
pub fn channels_router(config: &JoeConfig) -> Router {
    Router::new()
        .route(CHANNELS_PATH, get(get_channels))
        .with_state(Arc::new(webui_channels(config)))
}

async fn get_channels(State(channels): State<Arc<Option<Vec<ChannelEntry>>>>) -> Response {
    match channels.as_ref() {
        Some(channels) => Json(channels.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "web UI is not configured"),
    }
}
