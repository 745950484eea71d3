// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! POST /slack/events, shared by every events-callback workspace.
//!
//! The request is routed to the workspace whose signing secret verifies it.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::assistant::SlackAssistant;
use crate::events::EventPayload;
use crate::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

pub const EVENTS_PATH: &str = "/slack/events";

type Workspaces = Arc<Vec<Arc<SlackAssistant>>>;

pub fn events_router(assistants: Vec<Arc<SlackAssistant>>) -> Router {
    Router::new()
        .route(EVENTS_PATH, post(post_event))
        .with_state(Arc::new(assistants))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn post_event(
    State(workspaces): State<Workspaces>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timestamp = header(&headers, TIMESTAMP_HEADER);
    let signature = header(&headers, SIGNATURE_HEADER);
    let now = Utc::now().timestamp();

    let Some(assistant) = workspaces
        .iter()
        .find(|a| a.verify(timestamp, &body, signature, now))
    else {
        warn!("slack event rejected: bad signature");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let payload: EventPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "malformed slack event");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match payload {
        EventPayload::UrlVerification { challenge } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        EventPayload::EventCallback { event, .. } => {
            assistant.handle_event(&event).await;
            StatusCode::OK.into_response()
        }
        EventPayload::Unsupported => StatusCode::OK.into_response(),
    }
}
