// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by transports, collaborators and the processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::JoeError;

/// Identity snapshot of a chat user. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub display_name: String,
    pub real_name: String,
}

impl UserInfo {
    /// A user known only by id (transports without a directory lookup).
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            real_name: id.clone(),
            id,
        }
    }
}

/// Transport-normalized inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub channel_type: String,
    pub thread_id: String,
    pub timestamp: String,
    pub subtype: String,
    pub snippet_url: Option<String>,
    /// True for web-UI direct commands.
    pub direct: bool,
    pub session_id: Option<String>,
    pub command_id: Option<String>,
}

/// Lifecycle status of an output message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    None,
    Running,
    Ok,
    Error,
}

impl MessageStatus {
    /// Whether `self -> next` is an allowed transition.
    ///
    /// The only paths are `none -> running -> (ok | error)`, plus `none -> error` for
    /// messages failing before dispatch.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::None, MessageStatus::Running)
                | (MessageStatus::None, MessageStatus::Error)
                | (MessageStatus::Running, MessageStatus::Ok)
                | (MessageStatus::Running, MessageStatus::Error)
        )
    }

    /// Whether the status is terminal.
    pub fn is_final(self) -> bool {
        matches!(self, MessageStatus::Ok | MessageStatus::Error)
    }
}

/// How a message is delivered in the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Default,
    Thread,
    Ephemeral,
}

/// Output envelope published through a [`Messenger`](crate::traits::Messenger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel_id: String,
    pub message_id: String,
    pub thread_id: String,
    pub user_id: String,
    pub text: String,
    pub status: MessageStatus,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub notify_at: Option<DateTime<Utc>>,
    /// Platform session the message belongs to (web UI).
    pub session_id: String,
    /// Platform command the message answers (web UI).
    pub command_id: String,
}

impl Message {
    /// Creates an unpublished message addressed to a channel.
    pub fn new(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: String::new(),
            thread_id: String::new(),
            user_id: user_id.into(),
            text: text.into(),
            status: MessageStatus::None,
            kind: MessageKind::Default,
            created_at: Utc::now(),
            notify_at: None,
            session_id: String::new(),
            command_id: String::new(),
        }
    }

    /// Creates a message answering an inbound message in the same channel.
    pub fn reply_to(incoming: &IncomingMessage, text: impl Into<String>) -> Self {
        let mut msg = Self::new(&incoming.channel_id, &incoming.user_id, text);
        msg.session_id = incoming.session_id.clone().unwrap_or_default();
        msg.command_id = incoming.command_id.clone().unwrap_or_default();
        msg
    }

    /// Sets the delivery kind.
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the thread the message is posted into.
    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self.kind = MessageKind::Thread;
        self
    }

    pub fn is_published(&self) -> bool {
        !self.message_id.is_empty()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Appends a paragraph to the message text.
    pub fn append_text(&mut self, text: &str) {
        if self.text.is_empty() {
            self.text = text.to_string();
        } else {
            self.text.push('\n');
            self.text.push_str(text);
        }
    }

    /// Appends the user-visible error line.
    pub fn append_error(&mut self, error: &str) {
        self.append_text(&format!("ERROR: {error}"));
    }

    /// Applies a status transition; returns `false` when the transition is not allowed.
    pub fn set_status(&mut self, status: MessageStatus) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        true
    }

    /// Applies a status transition and returns the previous status.
    pub fn transition(&mut self, status: MessageStatus) -> Result<MessageStatus, JoeError> {
        let previous = self.status;
        if !self.set_status(status) {
            return Err(JoeError::Internal(format!(
                "invalid message status transition: {previous} -> {status}"
            )));
        }
        Ok(previous)
    }

    /// Id of the thread a follow-up reply should be posted into.
    pub fn reply_thread(&self) -> &str {
        if self.thread_id.is_empty() {
            &self.message_id
        } else {
            &self.thread_id
        }
    }

    /// Schedules the long-running completion mention.
    pub fn set_notify_at(&mut self, at: DateTime<Utc>) {
        self.notify_at = Some(at);
    }

    /// Whether a completion at `now` should ping the originating user.
    pub fn should_notify(&self, now: DateTime<Utc>) -> bool {
        self.notify_at.is_some_and(|at| now >= at)
    }
}

/// Platform-persisted record of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub session_id: String,
    pub command: String,
    pub query: String,
    pub response: String,
    pub plan_text: String,
    pub plan_json: String,
    pub plan_exec_text: String,
    pub plan_exec_json: String,
    pub recommendations: String,
    pub stats: String,
    pub error: String,
    /// RFC 3339 timestamp of the inbound message.
    pub timestamp: String,
}

impl CommandRecord {
    pub fn new(command: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            query: query.into(),
            timestamp: Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }
}

/// Advisory emitted by the plan analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub code: String,
    pub name: String,
    pub description: String,
    pub details_url: String,
}

/// Result of analyzing an `EXPLAIN (ANALYZE, FORMAT JSON)` plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanAnalysis {
    /// Text rendering of the execution plan.
    pub plan_text: String,
    pub tips: Vec<Tip>,
    /// Summary statistics block.
    pub stats: String,
    /// Total execution time in milliseconds, when reported.
    pub execution_time_ms: Option<f64>,
}

/// Connection parameters of a clone. `password` never appears in Debug output.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub ssl_mode: String,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[redacted]")
            .field("dbname", &self.dbname)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Per-channel database parameters used when connecting to clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DblabParams {
    pub dbname: String,
    pub ssl_mode: String,
}

impl Default for DblabParams {
    fn default() -> Self {
        Self {
            dbname: "postgres".to_string(),
            ssl_mode: "prefer".to_string(),
        }
    }
}

/// Remote clone status code meaning the clone is usable.
pub const CLONE_STATUS_OK: &str = "OK";

/// Database endpoint of a clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneDb {
    pub host: String,
    pub port: String,
    pub username: String,
    pub dbname: String,
}

/// Clone metadata reported by the database lab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneMetadata {
    pub max_idle_minutes: u32,
    pub data_state_at: String,
}

/// A clone as reported by the database lab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneInfo {
    pub id: String,
    /// Remote status code; only [`CLONE_STATUS_OK`] is usable.
    pub status: String,
    pub db: CloneDb,
    pub metadata: CloneMetadata,
}

impl CloneInfo {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case(CLONE_STATUS_OK)
    }
}

/// Request to create a clone with the given database credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CreateCloneRequest {
    pub id: String,
    pub protected: bool,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CreateCloneRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateCloneRequest")
            .field("id", &self.id)
            .field("protected", &self.protected)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Tabular SQL result where every value is rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the first column, skipping NULLs.
    pub fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first().cloned().flatten())
            .collect()
    }

    /// First value of the first row.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// Session record exchanged with the platform's `joe_session_create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSession {
    pub project: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub dblab_instance_id: Option<String>,
}

/// Artifact reference returned after an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactLink {
    pub id: String,
    pub permalink: String,
}

/// Platform acknowledgement of a persisted command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPosted {
    pub command_id: String,
    /// Link to the command page; empty when the platform returned none.
    pub permalink: String,
}

/// Message mirrored into the platform history (web UI transport).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMessage {
    pub session_id: String,
    pub command_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub text: String,
    pub status: MessageStatus,
}

/// Artifact uploaded into the platform history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformArtifact {
    pub session_id: String,
    pub message_id: String,
    pub title: String,
    pub content: String,
}
