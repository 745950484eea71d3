// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack socket mode.
//!
//! A reader task owns the websocket: it acknowledges every envelope and
//! forwards `events_api` payloads into a bounded channel. A dispatcher task
//! drains the channel and spawns one processing task per message.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use joe_agent::ProcessorRegistry;
use joe_core::JoeError;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::EventPayload;

/// Capacity of the reader-to-dispatcher channel.
pub const EVENT_BUFFER: usize = 20;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

fn socket_error(context: &str, e: impl std::fmt::Display) -> JoeError {
    JoeError::integration("slack", format!("socket mode {context}: {e}"))
}

/// Reads one socket mode connection until Slack closes it, asks to
/// reconnect, or `cancel` fires.
pub async fn run_reader(
    url: &str,
    events: mpsc::Sender<EventPayload>,
    cancel: CancellationToken,
) -> Result<(), JoeError> {
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| socket_error("connect failed", e))?;
    let (mut write, mut read) = stream.split();
    info!("socket mode connected");

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = write.send(Frame::Close(None)).await {
                    debug!(error = %e, "socket mode close failed");
                }
                break;
            }
            frame = read.next() => frame,
        };
        let Some(frame) = frame else {
            break;
        };

        let text = match frame.map_err(|e| socket_error("read failed", e))? {
            Frame::Text(text) => text,
            Frame::Close(_) => break,
            _ => continue,
        };

        let envelope: Envelope = match serde_json::from_str(text.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "malformed socket mode envelope");
                continue;
            }
        };

        if let Some(id) = &envelope.envelope_id {
            let ack = serde_json::json!({ "envelope_id": id }).to_string();
            write
                .send(Frame::Text(ack.into()))
                .await
                .map_err(|e| socket_error("ack failed", e))?;
        }

        match envelope.kind.as_str() {
            "hello" => debug!("socket mode hello"),
            "disconnect" => {
                info!(
                    reason = envelope.reason.as_deref().unwrap_or_default(),
                    "socket mode disconnect requested"
                );
                break;
            }
            "events_api" => {
                let Some(payload) = envelope.payload else {
                    continue;
                };
                match serde_json::from_value::<EventPayload>(payload) {
                    Ok(payload) => {
                        if events.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "malformed events_api payload"),
                }
            }
            other => debug!(kind = other, "ignored socket mode envelope"),
        }
    }

    info!("socket mode reader stopped");
    Ok(())
}

/// Spawns processing for every message event until the reader hangs up.
pub async fn run_dispatcher(
    mut events: mpsc::Receiver<EventPayload>,
    processors: Arc<ProcessorRegistry>,
) {
    while let Some(payload) = events.recv().await {
        let EventPayload::EventCallback { event, .. } = payload else {
            continue;
        };
        if let Some(incoming) = event.to_incoming() {
            processors.dispatch(incoming).await;
        }
    }
    debug!("socket mode dispatcher stopped");
}
