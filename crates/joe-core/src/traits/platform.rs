// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform collaborator: history of sessions, commands, messages and artifacts.

use async_trait::async_trait;

use crate::error::JoeError;
use crate::types::{
    ArtifactLink, CommandPosted, CommandRecord, PlatformArtifact, PlatformMessage,
    PlatformSession,
};

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Registers a session and returns its platform id.
    async fn create_session(&self, session: &PlatformSession) -> Result<String, JoeError>;

    /// Persists a command record.
    async fn post_command(&self, command: &CommandRecord) -> Result<CommandPosted, JoeError>;

    /// Creates or updates a history message and returns its id.
    async fn post_message(&self, message: &PlatformMessage) -> Result<String, JoeError>;

    async fn post_artifact(&self, artifact: &PlatformArtifact) -> Result<ArtifactLink, JoeError>;

    /// Registers a database lab instance for a project and returns its id.
    async fn create_instance(&self, project: &str, url: &str) -> Result<String, JoeError>;

    async fn destroy_instance(&self, instance_id: &str) -> Result<(), JoeError>;
}
