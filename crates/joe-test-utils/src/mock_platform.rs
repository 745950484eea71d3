// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording platform collaborator.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use joe_core::types::{
    ArtifactLink, CommandPosted, CommandRecord, PlatformArtifact, PlatformMessage,
    PlatformSession,
};
use joe_core::{JoeError, PlatformClient};

#[derive(Default)]
struct State {
    sessions: Vec<PlatformSession>,
    commands: Vec<CommandRecord>,
    messages: Vec<PlatformMessage>,
    artifacts: Vec<PlatformArtifact>,
    instances: Vec<(String, String)>,
    destroyed_instances: Vec<String>,
    fail_commands: bool,
}

#[derive(Default)]
pub struct MockPlatform {
    permalink: Option<String>,
    state: Mutex<State>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command permalink returned by `post_command`.
    pub fn with_permalink(mut self, url: &str) -> Self {
        self.permalink = Some(url.to_string());
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_commands(&self, fail: bool) {
        self.state().fail_commands = fail;
    }

    pub fn sessions(&self) -> Vec<PlatformSession> {
        self.state().sessions.clone()
    }

    pub fn commands(&self) -> Vec<CommandRecord> {
        self.state().commands.clone()
    }

    pub fn messages(&self) -> Vec<PlatformMessage> {
        self.state().messages.clone()
    }

    pub fn artifacts(&self) -> Vec<PlatformArtifact> {
        self.state().artifacts.clone()
    }

    /// `(project, url)` of every registered instance.
    pub fn instances(&self) -> Vec<(String, String)> {
        self.state().instances.clone()
    }

    pub fn destroyed_instances(&self) -> Vec<String> {
        self.state().destroyed_instances.clone()
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn create_session(&self, session: &PlatformSession) -> Result<String, JoeError> {
        let mut state = self.state();
        state.sessions.push(session.clone());
        Ok(format!("session-{}", state.sessions.len()))
    }

    async fn post_command(&self, command: &CommandRecord) -> Result<CommandPosted, JoeError> {
        let mut state = self.state();
        if state.fail_commands {
            return Err(JoeError::integration("platform", "command rejected"));
        }
        state.commands.push(command.clone());
        Ok(CommandPosted {
            command_id: format!("command-{}", state.commands.len()),
            permalink: self.permalink.clone().unwrap_or_default(),
        })
    }

    async fn post_message(&self, message: &PlatformMessage) -> Result<String, JoeError> {
        let mut state = self.state();
        state.messages.push(message.clone());
        Ok(message
            .message_id
            .clone()
            .unwrap_or_else(|| format!("message-{}", state.messages.len())))
    }

    async fn post_artifact(&self, artifact: &PlatformArtifact) -> Result<ArtifactLink, JoeError> {
        let mut state = self.state();
        state.artifacts.push(artifact.clone());
        let id = format!("artifact-{}", state.artifacts.len());
        Ok(ArtifactLink {
            permalink: format!("https://platform.test/artifacts/{id}"),
            id,
        })
    }

    async fn create_instance(&self, project: &str, url: &str) -> Result<String, JoeError> {
        let mut state = self.state();
        state.instances.push((project.to_string(), url.to_string()));
        Ok(format!("instance-{}", state.instances.len()))
    }

    async fn destroy_instance(&self, instance_id: &str) -> Result<(), JoeError> {
        self.state().destroyed_instances.push(instance_id.to_string());
        Ok(())
    }
}
