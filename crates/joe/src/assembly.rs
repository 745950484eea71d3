// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the engine collaborators and one assistant per configured workspace.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use joe_agent::{Assistant, BasicPlanAnalyzer, EditionPack, EngineDeps};
use joe_config::JoeConfig;
use joe_config::model::{
    TRANSPORT_SLACK, TRANSPORT_SLACK_RTM, TRANSPORT_SLACK_SOCKET_MODE, TRANSPORT_WEBUI,
    WorkspaceConfig,
};
use joe_core::{DblabClient, JoeError, PlatformClient, SystemClock};
use joe_dblab::HttpDblabClient;
use joe_platform::HttpPlatformClient;
use joe_postgres::{PgConnectionFactory, PsqlProcessRunner};
use joe_slack::{SlackApi, SlackAssistant, SlackMode, events_router};
use joe_webui::{WebUiAssistant, channels_router, command_router};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Time allowed to obtain a pooled connection to a clone.
const CONNECTION_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Database lab clients keyed by their `dblab_servers` name.
pub type DblabClients = HashMap<String, Arc<dyn DblabClient>>;

/// Assembled transports and the HTTP routes they serve.
pub struct Transports {
    pub assistants: Vec<Arc<dyn Assistant>>,
    pub router: Router,
}

impl std::fmt::Debug for Transports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.assistants.iter().map(|a| a.transport()).collect();
        f.debug_struct("Transports")
            .field("assistants", &names)
            .finish()
    }
}

#[cfg(feature = "enterprise")]
fn edition(config: &JoeConfig) -> EditionPack {
    EditionPack::enterprise(config.enterprise.estimator.clone())
}

#[cfg(not(feature = "enterprise"))]
fn edition(_config: &JoeConfig) -> EditionPack {
    EditionPack::community()
}

/// Production collaborators: platform over HTTP, clones over sqlx, psql as a process.
pub fn build_engine(config: &JoeConfig) -> Result<EngineDeps, JoeError> {
    let platform = match config.platform.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            let client = HttpPlatformClient::new(&config.platform.url, token)?;
            Some(Arc::new(client) as Arc<dyn PlatformClient>)
        }
        None => None,
    };

    Ok(EngineDeps {
        platform,
        connections: Arc::new(PgConnectionFactory::new(CONNECTION_ACQUIRE_TIMEOUT)),
        analyzer: Arc::new(BasicPlanAnalyzer),
        psql: Arc::new(PsqlProcessRunner::default()),
        edition: edition(config),
        clock: Arc::new(SystemClock),
    })
}

pub fn build_dblab_clients(config: &JoeConfig) -> Result<DblabClients, JoeError> {
    config
        .channel_mapping
        .dblab_servers
        .iter()
        .map(|(name, server)| {
            let client = HttpDblabClient::new(&server.url, &server.token)?;
            Ok((name.clone(), Arc::new(client) as Arc<dyn DblabClient>))
        })
        .collect()
}

fn dblab_for(
    dblabs: &DblabClients,
    workspace: &WorkspaceConfig,
    server: &str,
) -> Result<Arc<dyn DblabClient>, JoeError> {
    dblabs.get(server).cloned().ok_or_else(|| {
        JoeError::Config(format!(
            "workspace \"{}\": unknown dblab server \"{server}\"",
            workspace.name
        ))
    })
}

async fn add_channels(
    assistant: &dyn Assistant,
    workspace: &WorkspaceConfig,
    dblabs: &DblabClients,
) -> Result<(), JoeError> {
    for channel in &workspace.channels {
        let dblab = dblab_for(dblabs, workspace, &channel.dblab_server)?;
        assistant.add_channel(channel, dblab).await?;
    }
    Ok(())
}

/// Creates, initializes and populates an assistant for every workspace.
///
/// Assistants are not registered yet; background loops start with
/// [`Assistant::register`] once sessions are restored.
pub async fn assemble(
    config: Arc<JoeConfig>,
    engine: EngineDeps,
    dblabs: &DblabClients,
    cancel: &CancellationToken,
) -> Result<Transports, JoeError> {
    let mut assistants: Vec<Arc<dyn Assistant>> = Vec::new();
    let mut router = Router::new();
    let mut webui_count = 0;
    let mut events_workspaces = Vec::new();

    for (transport, workspaces) in &config.channel_mapping.communication_types {
        for workspace in workspaces {
            match transport.as_str() {
                TRANSPORT_WEBUI => {
                    webui_count += 1;
                    if webui_count > 1 {
                        return Err(JoeError::Config(
                            "only one webui workspace can be configured".into(),
                        ));
                    }
                    let assistant = Arc::new(WebUiAssistant::new(
                        Arc::clone(&config),
                        workspace.clone(),
                        engine.clone(),
                        cancel.child_token(),
                    )?);
                    assistant.init().await?;
                    add_channels(assistant.as_ref(), workspace, dblabs).await?;
                    router = router.merge(command_router(Arc::clone(&assistant)));
                    assistants.push(assistant);
                }
                TRANSPORT_SLACK | TRANSPORT_SLACK_SOCKET_MODE => {
                    let mode = if transport == TRANSPORT_SLACK {
                        SlackMode::Events
                    } else {
                        SlackMode::SocketMode
                    };
                    let token = workspace.credentials.access_token.as_deref().unwrap_or("");
                    let assistant = Arc::new(SlackAssistant::new(
                        mode,
                        Arc::clone(&config),
                        workspace.clone(),
                        SlackApi::new(token)?,
                        engine.clone(),
                        cancel.child_token(),
                    ));
                    assistant.init().await?;
                    add_channels(assistant.as_ref(), workspace, dblabs).await?;
                    if mode == SlackMode::Events {
                        events_workspaces.push(Arc::clone(&assistant));
                    }
                    assistants.push(assistant);
                }
                TRANSPORT_SLACK_RTM => {
                    return Err(JoeError::Config(format!(
                        "the \"{TRANSPORT_SLACK_RTM}\" transport is no longer supported; \
                         use \"{TRANSPORT_SLACK}\" or \"{TRANSPORT_SLACK_SOCKET_MODE}\""
                    )));
                }
                other => {
                    return Err(JoeError::Config(format!(
                        "unknown transport \"{other}\"; expected one of \
                         {TRANSPORT_SLACK}, {TRANSPORT_SLACK_SOCKET_MODE}, {TRANSPORT_WEBUI}"
                    )));
                }
            }
            info!(
                transport = transport.as_str(),
                workspace = workspace.name.as_str(),
                channels = workspace.channels.len(),
                "assistant assembled"
            );
        }
    }

    if assistants.is_empty() {
        return Err(JoeError::Config("no processors configured".into()));
    }

    if !events_workspaces.is_empty() {
        router = router.merge(events_router(events_workspaces));
    }
    router = router.merge(channels_router(&config));

    Ok(Transports { assistants, router })
}
