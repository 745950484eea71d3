// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Slack [`Assistant`], for both the events callback and socket mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use joe_agent::{
    Assistant, EngineDeps, ProcessingService, ProcessorRegistry, ServiceConfig, ServiceDeps,
    SharedState, drain_tasks,
};
use joe_config::JoeConfig;
use joe_config::model::{
    ChannelConfig, TRANSPORT_SLACK, TRANSPORT_SLACK_SOCKET_MODE, WorkspaceConfig,
};
use joe_core::{DblabClient, JoeError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::api::SlackApi;
use crate::events::{SlackEvent, SlackValidator};
use crate::messenger::SlackMessenger;
use crate::signature;
use crate::socket::{EVENT_BUFFER, run_dispatcher, run_reader};

const LOOP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn credential(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// How Slack delivers events to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlackMode {
    /// HTTP callbacks on `/slack/events`.
    Events,
    /// A websocket opened with the app-level token.
    SocketMode,
}

impl SlackMode {
    pub fn transport(self) -> &'static str {
        match self {
            SlackMode::Events => TRANSPORT_SLACK,
            SlackMode::SocketMode => TRANSPORT_SLACK_SOCKET_MODE,
        }
    }
}

pub struct SlackAssistant {
    mode: SlackMode,
    config: Arc<JoeConfig>,
    workspace: WorkspaceConfig,
    api: Arc<SlackApi>,
    deps: ServiceDeps,
    shared: SharedState,
    processors: Arc<ProcessorRegistry>,
    cancel: CancellationToken,
    loops: TaskTracker,
    loops_cancel: CancellationToken,
}

impl std::fmt::Debug for SlackAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackAssistant")
            .field("mode", &self.mode)
            .field("workspace", &self.workspace.name)
            .field("credentials", &self.workspace.credentials)
            .finish()
    }
}

impl SlackAssistant {
    pub fn new(
        mode: SlackMode,
        config: Arc<JoeConfig>,
        workspace: WorkspaceConfig,
        api: SlackApi,
        engine: EngineDeps,
        cancel: CancellationToken,
    ) -> Self {
        let api = Arc::new(api);
        let deps = engine.with_transport(
            Arc::new(SlackMessenger::new(Arc::clone(&api))),
            Arc::new(SlackValidator),
            api.clone(),
        );
        let shared = SharedState::new(
            &deps,
            config.enterprise.quota.limit,
            config.enterprise.quota.interval,
        );

        Self {
            mode,
            config,
            workspace,
            api,
            deps,
            shared,
            processors: Arc::new(ProcessorRegistry::new(mode.transport())),
            loops_cancel: cancel.child_token(),
            cancel,
            loops: TaskTracker::new(),
        }
    }

    pub fn mode(&self) -> SlackMode {
        self.mode
    }

    fn missing(&self, field: &str) -> JoeError {
        JoeError::Config(format!(
            "{} workspace \"{}\": credentials.{field} is required",
            self.mode.transport(),
            self.workspace.name
        ))
    }

    /// Checks an events callback signature against this workspace's secret.
    pub fn verify(&self, timestamp: &str, body: &[u8], sig: &str, now: i64) -> bool {
        credential(&self.workspace.credentials.signing_secret)
            .is_some_and(|secret| signature::verify(secret, timestamp, body, sig, now))
    }

    /// Dispatches a message event to its channel. `false` when nothing was spawned.
    pub async fn handle_event(&self, event: &SlackEvent) -> bool {
        match event.to_incoming() {
            Some(incoming) => self.processors.dispatch(incoming).await,
            None => false,
        }
    }
}

#[async_trait]
impl Assistant for SlackAssistant {
    fn transport(&self) -> &str {
        self.mode.transport()
    }

    async fn init(&self) -> Result<(), JoeError> {
        let creds = &self.workspace.credentials;
        if credential(&creds.access_token).is_none() {
            return Err(self.missing("access_token"));
        }
        match self.mode {
            SlackMode::Events if credential(&creds.signing_secret).is_none() => {
                return Err(self.missing("signing_secret"));
            }
            SlackMode::SocketMode if credential(&creds.app_level_token).is_none() => {
                return Err(self.missing("app_level_token"));
            }
            _ => {}
        }

        let auth = self.api.auth_test().await?;
        info!(
            transport = self.mode.transport(),
            team = auth.team.as_str(),
            bot_user_id = auth.user_id.as_str(),
            "slack credentials verified"
        );
        Ok(())
    }

    async fn register(&self) -> Result<(), JoeError> {
        if self.mode == SlackMode::Events {
            info!(workspace = self.workspace.name.as_str(), "slack events callback ready");
            return Ok(());
        }

        let app_token = credential(&self.workspace.credentials.app_level_token)
            .ok_or_else(|| self.missing("app_level_token"))?;
        let url = self.api.open_connection(app_token).await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = self.loops_cancel.clone();
        self.loops.spawn(async move {
            if let Err(e) = run_reader(&url, tx, cancel).await {
                error!(error = %e, "socket mode reader failed");
            }
        });
        self.loops
            .spawn(run_dispatcher(rx, Arc::clone(&self.processors)));
        info!(workspace = self.workspace.name.as_str(), "slack socket mode registered");
        Ok(())
    }

    async fn deregister(&self) -> Result<(), JoeError> {
        self.loops_cancel.cancel();
        if !drain_tasks(&self.loops, LOOP_SHUTDOWN_TIMEOUT).await {
            warn!(transport = self.mode.transport(), "slack loops did not stop in time");
        }
        Ok(())
    }

    async fn add_channel(
        &self,
        channel: &ChannelConfig,
        dblab: Arc<dyn DblabClient>,
    ) -> Result<(), JoeError> {
        let mut service_config =
            ServiceConfig::from_config(&self.config, self.mode.transport(), channel);
        service_config.unfurl_links = true;

        let service = ProcessingService::with_shared(
            service_config,
            self.deps.clone(),
            dblab,
            self.shared.clone(),
            self.cancel.clone(),
        );
        self.processors.add(service).await;
        Ok(())
    }

    fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_transport_names() {
        assert_eq!(SlackMode::Events.transport(), "slack");
        assert_eq!(SlackMode::SocketMode.transport(), "slacksm");
    }
}
