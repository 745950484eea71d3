// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Events API payloads and their normalization.
//!
//! Both the events callback and socket mode deliver the same
//! `event_callback` envelope; only `message` events are turned into
//! [`IncomingMessage`]s.

use joe_core::traits::validator::require_user_and_channel;
use joe_core::types::IncomingMessage;
use joe_core::{JoeError, Validator};
use serde::Deserialize;

pub const SUBTYPE_FILE_SHARE: &str = "file_share";
pub const SUBTYPE_BOT_MESSAGE: &str = "bot_message";

/// Top-level body of an Events API request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        team_id: String,
        event: SlackEvent,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub channel_type: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackFile {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub url_private: String,
}

impl SlackEvent {
    /// `None` for events other than channel messages.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        if self.kind != "message" {
            return None;
        }

        let snippet_url = if self.subtype == SUBTYPE_FILE_SHARE {
            self.files
                .iter()
                .find(|f| f.mode == "snippet" && !f.url_private.is_empty())
                .map(|f| f.url_private.clone())
        } else {
            None
        };

        let subtype = if self.bot_id.is_some() && self.subtype.is_empty() {
            SUBTYPE_BOT_MESSAGE.to_string()
        } else {
            self.subtype.clone()
        };

        Some(IncomingMessage {
            text: self.text.clone(),
            user_id: self.user.clone(),
            channel_id: self.channel.clone(),
            channel_type: self.channel_type.clone(),
            thread_id: self.thread_ts.clone().unwrap_or_default(),
            timestamp: self.ts.clone(),
            subtype,
            snippet_url,
            ..IncomingMessage::default()
        })
    }
}

/// Accepts top-level human messages and shared snippets.
#[derive(Debug, Default)]
pub struct SlackValidator;

impl Validator for SlackValidator {
    fn validate(&self, msg: &IncomingMessage) -> Result<(), JoeError> {
        require_user_and_channel(msg)?;
        if !msg.subtype.is_empty() && msg.subtype != SUBTYPE_FILE_SHARE {
            return Err(JoeError::Validation(format!(
                "unsupported message subtype {}",
                msg.subtype
            )));
        }
        // Replies inside a thread carry the parent's ts.
        if !msg.thread_id.is_empty() && msg.thread_id != msg.timestamp {
            return Err(JoeError::Validation("thread replies are ignored".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(event: serde_json::Value) -> EventPayload {
        serde_json::from_value(serde_json::json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": event,
        }))
        .unwrap()
    }

    fn event_of(payload: EventPayload) -> SlackEvent {
        match payload {
            EventPayload::EventCallback { event, .. } => event,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn url_verification_is_parsed() {
        let payload: EventPayload = serde_json::from_str(
            r#"{"type":"url_verification","token":"t","challenge":"abc"}"#,
        )
        .unwrap();
        assert!(matches!(payload, EventPayload::UrlVerification { challenge } if challenge == "abc"));
    }

    #[test]
    fn unknown_payload_type_is_unsupported() {
        let payload: EventPayload =
            serde_json::from_str(r#"{"type":"app_rate_limited"}"#).unwrap();
        assert!(matches!(payload, EventPayload::Unsupported));
    }

    #[test]
    fn channel_message_is_normalized() {
        let event = event_of(callback(serde_json::json!({
            "type": "message",
            "channel": "C1",
            "channel_type": "channel",
            "user": "U1",
            "text": "explain select 1",
            "ts": "1700000000.000100",
        })));
        let msg = event.to_incoming().unwrap();
        assert_eq!(msg.channel_id, "C1");
        assert_eq!(msg.text, "explain select 1");
        assert!(!msg.direct);
        assert!(SlackValidator.validate(&msg).is_ok());
    }

    #[test]
    fn snippet_share_carries_file_url() {
        let event = event_of(callback(serde_json::json!({
            "type": "message",
            "subtype": "file_share",
            "channel": "C1",
            "user": "U1",
            "ts": "1.1",
            "files": [{"mode": "snippet", "url_private": "https://files.slack.com/q.sql"}],
        })));
        let msg = event.to_incoming().unwrap();
        assert_eq!(msg.snippet_url.as_deref(), Some("https://files.slack.com/q.sql"));
        assert!(SlackValidator.validate(&msg).is_ok());
    }

    #[test]
    fn bot_and_thread_messages_are_rejected() {
        let bot = SlackEvent {
            kind: "message".into(),
            channel: "C1".into(),
            user: "U1".into(),
            bot_id: Some("B1".into()),
            ts: "1.1".into(),
            ..SlackEvent::default()
        };
        assert!(SlackValidator.validate(&bot.to_incoming().unwrap()).is_err());

        let reply = SlackEvent {
            kind: "message".into(),
            channel: "C1".into(),
            user: "U1".into(),
            ts: "1.2".into(),
            thread_ts: Some("1.1".into()),
            ..SlackEvent::default()
        };
        assert!(SlackValidator.validate(&reply.to_incoming().unwrap()).is_err());

        let edited = SlackEvent {
            subtype: "message_changed".into(),
            ..reply
        };
        assert!(SlackValidator.validate(&edited.to_incoming().unwrap()).is_err());
    }

    #[test]
    fn non_message_events_are_skipped() {
        let event = SlackEvent {
            kind: "reaction_added".into(),
            ..SlackEvent::default()
        };
        assert!(event.to_incoming().is_none());
    }
}
