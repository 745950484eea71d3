// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messenger capturing everything the pipeline presents.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use joe_core::types::{Message, MessageKind, MessageStatus};
use joe_core::{JoeError, Messenger};

/// One artifact uploaded through [`MockMessenger::add_artifact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArtifact {
    pub message_id: String,
    pub title: String,
    pub content: String,
    pub permalink: String,
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// Message ids in publish order.
    order: Vec<String>,
    /// Latest state of every published message.
    messages: HashMap<String, Message>,
    statuses: Vec<(String, MessageStatus)>,
    artifacts: Vec<UploadedArtifact>,
    downloads: HashMap<String, String>,
    fail_publish: bool,
}

/// A messenger keeping every message in memory for assertions.
#[derive(Default)]
pub struct MockMessenger {
    state: Mutex<State>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serves `body` for downloads of `url`.
    pub fn with_download(self, url: &str, body: &str) -> Self {
        self.state().downloads.insert(url.to_string(), body.to_string());
        self
    }

    /// Makes every `publish` fail.
    pub fn fail_publish(&self, fail: bool) {
        self.state().fail_publish = fail;
    }

    /// Latest state of every published message, in publish order.
    pub fn messages(&self) -> Vec<Message> {
        let state = self.state();
        state
            .order
            .iter()
            .filter_map(|id| state.messages.get(id).cloned())
            .collect()
    }

    /// Published messages that are not ephemeral.
    pub fn visible(&self) -> Vec<Message> {
        self.messages()
            .into_iter()
            .filter(|m| m.kind != MessageKind::Ephemeral)
            .collect()
    }

    pub fn ephemeral(&self) -> Vec<Message> {
        self.messages()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Ephemeral)
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages().pop()
    }

    /// The first message whose text contains `needle`.
    pub fn find(&self, needle: &str) -> Option<Message> {
        self.messages().into_iter().find(|m| m.text.contains(needle))
    }

    /// Status transitions in the order they were applied.
    pub fn statuses(&self) -> Vec<(String, MessageStatus)> {
        self.state().statuses.clone()
    }

    pub fn artifacts(&self) -> Vec<UploadedArtifact> {
        self.state().artifacts.clone()
    }

    pub fn artifact_titles(&self) -> Vec<String> {
        self.state()
            .artifacts
            .iter()
            .map(|a| a.title.clone())
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.order.clear();
        state.messages.clear();
        state.statuses.clear();
        state.artifacts.clear();
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn publish(&self, msg: &mut Message) -> Result<(), JoeError> {
        let mut state = self.state();
        if state.fail_publish {
            return Err(JoeError::integration("mock", "publish failed"));
        }
        state.next_id += 1;
        msg.message_id = format!("msg-{}", state.next_id);
        state.order.push(msg.message_id.clone());
        state.messages.insert(msg.message_id.clone(), msg.clone());
        Ok(())
    }

    async fn update_text(&self, msg: &Message) -> Result<(), JoeError> {
        let mut state = self.state();
        match state.messages.get_mut(&msg.message_id) {
            Some(stored) => {
                stored.text = msg.text.clone();
                Ok(())
            }
            None => Err(JoeError::integration(
                "mock",
                format!("message {} was never published", msg.message_id),
            )),
        }
    }

    async fn update_status(
        &self,
        msg: &mut Message,
        status: MessageStatus,
    ) -> Result<(), JoeError> {
        msg.transition(status)?;
        let mut state = self.state();
        state.statuses.push((msg.message_id.clone(), status));
        if let Some(stored) = state.messages.get_mut(&msg.message_id) {
            stored.status = status;
            stored.text = msg.text.clone();
        }
        Ok(())
    }

    async fn add_artifact(
        &self,
        msg: &Message,
        title: &str,
        content: &str,
    ) -> Result<String, JoeError> {
        let mut state = self.state();
        let permalink = format!("https://files.test/{}/{title}", msg.message_id);
        state.artifacts.push(UploadedArtifact {
            message_id: msg.message_id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            permalink: permalink.clone(),
        });
        Ok(permalink)
    }

    async fn download_artifact(&self, url: &str) -> Result<String, JoeError> {
        self.state()
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| JoeError::integration("mock", format!("no snippet at {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_assigns_ids_and_tracks_updates() {
        let messenger = MockMessenger::new();
        let mut msg = Message::new("C1", "U1", "first");
        messenger.publish(&mut msg).await.unwrap();
        assert_eq!(msg.message_id, "msg-1");

        msg.append_text("second");
        messenger.update_text(&msg).await.unwrap();
        assert_eq!(messenger.texts(), vec!["first\nsecond".to_string()]);
    }

    #[tokio::test]
    async fn fail_marks_error_status() {
        let messenger = MockMessenger::new();
        let mut msg = Message::new("C1", "U1", "exec");
        messenger.fail(&mut msg, "boom").await.unwrap();

        let stored = messenger.last().unwrap();
        assert_eq!(stored.status, MessageStatus::Error);
        assert_eq!(stored.text, "exec\nERROR: boom");
    }

    #[tokio::test]
    async fn unknown_download_is_an_error() {
        let messenger = MockMessenger::new().with_download("https://f/1", "select 1");
        assert_eq!(messenger.download_artifact("https://f/1").await.unwrap(), "select 1");
        assert!(messenger.download_artifact("https://f/2").await.is_err());
    }
}
