// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger that writes into the platform history.
//!
//! Web UI users read replies from the platform, so every publish, edit and
//! status change becomes a `joe_message_post` call and artifacts go through
//! `joe_message_artifact_post`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use joe_core::types::{Message, MessageStatus, PlatformArtifact, PlatformMessage};
use joe_core::{JoeError, Messenger, PlatformClient};
use tracing::debug;

pub struct PlatformMessenger {
    platform: Arc<dyn PlatformClient>,
}

impl PlatformMessenger {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }

    fn record(msg: &Message) -> PlatformMessage {
        PlatformMessage {
            session_id: msg.session_id.clone(),
            command_id: msg.command_id.clone(),
            message_id: msg.is_published().then(|| msg.message_id.clone()),
            text: msg.text.clone(),
            status: msg.status,
        }
    }

    async fn post(&self, msg: &mut Message) -> Result<(), JoeError> {
        let message_id = self.platform.post_message(&Self::record(msg)).await?;
        if !msg.is_published() {
            debug!(
                message_id = message_id.as_str(),
                session_id = msg.session_id.as_str(),
                "message posted"
            );
            msg.message_id = message_id;
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for PlatformMessenger {
    async fn publish(&self, msg: &mut Message) -> Result<(), JoeError> {
        self.post(msg).await
    }

    async fn update_text(&self, msg: &Message) -> Result<(), JoeError> {
        if !msg.is_published() {
            return Err(JoeError::Internal("cannot update an unpublished message".into()));
        }
        self.platform.post_message(&Self::record(msg)).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        msg: &mut Message,
        status: MessageStatus,
    ) -> Result<(), JoeError> {
        msg.transition(status)?;
        self.post(msg).await
    }

    async fn add_artifact(
        &self,
        msg: &Message,
        title: &str,
        content: &str,
    ) -> Result<String, JoeError> {
        let link = self
            .platform
            .post_artifact(&PlatformArtifact {
                session_id: msg.session_id.clone(),
                message_id: msg.message_id.clone(),
                title: title.to_string(),
                content: content.to_string(),
            })
            .await?;
        Ok(link.permalink)
    }

    async fn download_artifact(&self, _url: &str) -> Result<String, JoeError> {
        Err(JoeError::integration(
            "webui",
            "snippets are not supported by the web UI transport",
        ))
    }

    // Completion mentions are a chat feature; the platform shows status.
    async fn ok(&self, msg: &mut Message, _now: DateTime<Utc>) -> Result<(), JoeError> {
        self.update_status(msg, MessageStatus::Ok).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joe_test_utils::MockPlatform;

    fn message() -> Message {
        let mut msg = Message::new("ProductionDB", "U1", "explain select 1");
        msg.session_id = "S1".into();
        msg.command_id = "K1".into();
        msg
    }

    #[tokio::test]
    async fn publish_then_update_reuses_message_id() {
        let platform = Arc::new(MockPlatform::new());
        let messenger = PlatformMessenger::new(platform.clone());

        let mut msg = message();
        messenger.publish(&mut msg).await.unwrap();
        assert_eq!(msg.message_id, "message-1");

        messenger
            .update_status(&mut msg, MessageStatus::Running)
            .await
            .unwrap();
        msg.append_text("done");
        messenger.ok(&mut msg, chrono::Utc::now()).await.unwrap();

        let posted = platform.messages();
        assert_eq!(posted.len(), 3);
        assert_eq!(posted[0].message_id, None);
        assert_eq!(posted[0].session_id, "S1");
        assert_eq!(posted[0].command_id, "K1");
        assert_eq!(posted[1].message_id.as_deref(), Some("message-1"));
        assert_eq!(posted[1].status, MessageStatus::Running);
        assert_eq!(posted[2].status, MessageStatus::Ok);
        assert!(posted[2].text.ends_with("done"));
        assert_eq!(msg.message_id, "message-1");
    }

    #[tokio::test]
    async fn backwards_status_is_not_posted() {
        let platform = Arc::new(MockPlatform::new());
        let messenger = PlatformMessenger::new(platform.clone());

        let mut msg = message();
        messenger.publish(&mut msg).await.unwrap();
        messenger
            .update_status(&mut msg, MessageStatus::Error)
            .await
            .unwrap();
        assert!(messenger
            .update_status(&mut msg, MessageStatus::Running)
            .await
            .is_err());
        assert_eq!(platform.messages().len(), 2);
    }

    #[tokio::test]
    async fn artifacts_return_platform_permalink() {
        let platform = Arc::new(MockPlatform::new());
        let messenger = PlatformMessenger::new(platform.clone());

        let mut msg = message();
        messenger.publish(&mut msg).await.unwrap();
        let link = messenger
            .add_artifact(&msg, "plan-text", "Seq Scan on users")
            .await
            .unwrap();

        assert_eq!(link, "https://platform.test/artifacts/artifact-1");
        let artifact = &platform.artifacts()[0];
        assert_eq!(artifact.message_id, "message-1");
        assert_eq!(artifact.title, "plan-text");
    }

    #[tokio::test]
    async fn unpublished_text_update_fails() {
        let messenger = PlatformMessenger::new(Arc::new(MockPlatform::new()));
        assert!(messenger.update_text(&message()).await.is_err());
        assert!(messenger.download_artifact("https://x").await.is_err());
    }
}
