// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack output: messages, status reactions and uploaded artifacts.

use std::sync::Arc;

use async_trait::async_trait;
use joe_core::types::{Message, MessageKind, MessageStatus};
use joe_core::{JoeError, Messenger};
use tracing::{debug, warn};

use crate::api::SlackApi;

pub const REACTION_RUNNING: &str = "hourglass_flowing_sand";
pub const REACTION_OK: &str = "white_check_mark";
pub const REACTION_ERROR: &str = "x";

/// Reaction presenting a status; `None` has no reaction.
pub fn reaction(status: MessageStatus) -> Option<&'static str> {
    match status {
        MessageStatus::None => None,
        MessageStatus::Running => Some(REACTION_RUNNING),
        MessageStatus::Ok => Some(REACTION_OK),
        MessageStatus::Error => Some(REACTION_ERROR),
    }
}

pub struct SlackMessenger {
    api: Arc<SlackApi>,
}

impl SlackMessenger {
    pub fn new(api: Arc<SlackApi>) -> Self {
        Self { api }
    }

    fn thread(msg: &Message) -> Option<&str> {
        (!msg.thread_id.is_empty()).then_some(msg.thread_id.as_str())
    }
}

#[async_trait]
impl Messenger for SlackMessenger {
    async fn publish(&self, msg: &mut Message) -> Result<(), JoeError> {
        let ts = match msg.kind {
            MessageKind::Ephemeral => {
                self.api
                    .post_ephemeral(&msg.channel_id, &msg.user_id, &msg.text, Self::thread(msg))
                    .await?
            }
            MessageKind::Default | MessageKind::Thread => {
                self.api
                    .post_message(&msg.channel_id, &msg.text, Self::thread(msg))
                    .await?
            }
        };
        debug!(channel_id = msg.channel_id.as_str(), ts = ts.as_str(), "message published");
        msg.message_id = ts;
        Ok(())
    }

    async fn update_text(&self, msg: &Message) -> Result<(), JoeError> {
        // Ephemeral messages cannot be edited.
        if msg.kind == MessageKind::Ephemeral {
            return Ok(());
        }
        if !msg.is_published() {
            return Err(JoeError::Internal("cannot update an unpublished message".into()));
        }
        self.api
            .update_message(&msg.channel_id, &msg.message_id, &msg.text)
            .await
    }

    async fn update_status(
        &self,
        msg: &mut Message,
        status: MessageStatus,
    ) -> Result<(), JoeError> {
        let previous = msg.transition(status)?;
        if msg.kind == MessageKind::Ephemeral || !msg.is_published() {
            return Ok(());
        }

        if let Some(old) = reaction(previous)
            && let Err(e) = self
                .api
                .remove_reaction(&msg.channel_id, &msg.message_id, old)
                .await
        {
            warn!(reaction = old, error = %e, "failed to remove status reaction");
        }
        if let Some(new) = reaction(status) {
            self.api
                .add_reaction(&msg.channel_id, &msg.message_id, new)
                .await?;
        }
        Ok(())
    }

    async fn add_artifact(
        &self,
        msg: &Message,
        title: &str,
        content: &str,
    ) -> Result<String, JoeError> {
        self.api
            .upload_file(&msg.channel_id, msg.reply_thread(), title, content)
            .await
    }

    async fn download_artifact(&self, url: &str) -> Result<String, JoeError> {
        self.api.download(url).await
    }
}
