// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output side of a chat transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::JoeError;
use crate::types::{Message, MessageStatus};

/// Text of the long-running completion mention.
pub fn completion_notice(user_id: &str) -> String {
    format!("<@{user_id}> :point_up_2: Your command has been completed.")
}

/// Transport-specific publish/update/artifact interface.
///
/// Implementations own delivery. Status presentation (reactions, platform status
/// fields) happens in [`Messenger::update_status`], which must apply the transition
/// through [`Message::transition`] so a status never moves backwards.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Posts a new message and records its `message_id`.
    async fn publish(&self, msg: &mut Message) -> Result<(), JoeError>;

    /// Replaces the text of a published message.
    async fn update_text(&self, msg: &Message) -> Result<(), JoeError>;

    /// Transitions the message status and presents it in the channel.
    async fn update_status(&self, msg: &mut Message, status: MessageStatus)
    -> Result<(), JoeError>;

    /// Uploads a text artifact attached to a message and returns its permalink.
    async fn add_artifact(
        &self,
        msg: &Message,
        title: &str,
        content: &str,
    ) -> Result<String, JoeError>;

    /// Downloads an artifact (snippet) body.
    async fn download_artifact(&self, url: &str) -> Result<String, JoeError>;

    /// Marks the message as failed with a user-visible error line.
    async fn fail(&self, msg: &mut Message, error: &str) -> Result<(), JoeError> {
        msg.append_error(error);
        if msg.is_published() {
            self.update_text(msg).await?;
        } else {
            self.publish(msg).await?;
        }
        self.update_status(msg, MessageStatus::Error).await
    }

    /// Marks the message as completed at `now`, pinging the user when it ran long.
    async fn ok(&self, msg: &mut Message, now: DateTime<Utc>) -> Result<(), JoeError> {
        self.update_status(msg, MessageStatus::Ok).await?;

        if msg.should_notify(now) {
            let mut notice = Message::new(
                msg.channel_id.clone(),
                msg.user_id.clone(),
                completion_notice(&msg.user_id),
            )
            .in_thread(msg.reply_thread().to_string());
            notice.session_id = msg.session_id.clone();
            notice.command_id = msg.command_id.clone();
            self.publish(&mut notice).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_notice_mentions_user() {
        assert_eq!(
            completion_notice("U42"),
            "<@U42> :point_up_2: Your command has been completed."
        );
    }
}
