// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The web UI [`Assistant`].
//!
//! Each channel is a Database Lab instance registered with the platform.
//! Commands arrive over signed HTTP and replies are written back into the
//! platform history by [`PlatformMessenger`].

use std::sync::Arc;

use async_trait::async_trait;
use joe_agent::{
    Assistant, EngineDeps, ProcessingService, ProcessorRegistry, ServiceConfig, ServiceDeps,
    SharedState,
};
use joe_config::JoeConfig;
use joe_config::model::{ChannelConfig, TRANSPORT_WEBUI, WorkspaceConfig};
use joe_core::types::IncomingMessage;
use joe_core::{DblabClient, JoeError, PlatformClient};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::messenger::PlatformMessenger;
use crate::signature;
use crate::validator::{PlatformUserInformer, WebUiValidator};

pub struct WebUiAssistant {
    config: Arc<JoeConfig>,
    workspace: WorkspaceConfig,
    platform: Arc<dyn PlatformClient>,
    deps: ServiceDeps,
    shared: SharedState,
    processors: ProcessorRegistry,
    instances: Mutex<Vec<String>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for WebUiAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebUiAssistant")
            .field("workspace", &self.workspace.name)
            .field("credentials", &self.workspace.credentials)
            .finish()
    }
}

impl WebUiAssistant {
    /// Fails when no platform client is configured; the web UI has no other output.
    pub fn new(
        config: Arc<JoeConfig>,
        workspace: WorkspaceConfig,
        engine: EngineDeps,
        cancel: CancellationToken,
    ) -> Result<Self, JoeError> {
        let platform = engine.platform.clone().ok_or_else(|| {
            JoeError::Config("the web UI transport requires platform.token".into())
        })?;

        let deps = engine.with_transport(
            Arc::new(PlatformMessenger::new(Arc::clone(&platform))),
            Arc::new(WebUiValidator),
            Arc::new(PlatformUserInformer),
        );
        let shared = SharedState::new(
            &deps,
            config.enterprise.quota.limit,
            config.enterprise.quota.interval,
        );

        Ok(Self {
            config,
            workspace,
            platform,
            deps,
            shared,
            processors: ProcessorRegistry::new(TRANSPORT_WEBUI),
            instances: Mutex::new(Vec::new()),
            cancel,
        })
    }

    fn signing_secret(&self) -> Option<&str> {
        self.workspace
            .credentials
            .signing_secret
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    /// Checks the `Verification-Signature` header of a request body.
    pub fn verify(&self, body: &[u8], header: &str) -> bool {
        self.signing_secret()
            .is_some_and(|secret| signature::verify(secret, body, header))
    }

    /// Hands a command to its channel. `false` when the channel is unknown.
    pub async fn dispatch(&self, incoming: IncomingMessage) -> bool {
        self.processors.dispatch(incoming).await
    }

    /// Platform ids of the registered Database Lab instances.
    pub async fn instance_ids(&self) -> Vec<String> {
        self.instances.lock().await.clone()
    }
}

#[async_trait]
impl Assistant for WebUiAssistant {
    fn transport(&self) -> &str {
        TRANSPORT_WEBUI
    }

    async fn init(&self) -> Result<(), JoeError> {
        if self.signing_secret().is_none() {
            return Err(JoeError::Config(format!(
                "webui workspace \"{}\": credentials.signing_secret is required",
                self.workspace.name
            )));
        }
        Ok(())
    }

    async fn register(&self) -> Result<(), JoeError> {
        let channels = self.processors.len().await;
        info!(
            workspace = self.workspace.name.as_str(),
            channels = channels,
            "web UI transport ready"
        );
        Ok(())
    }

    async fn deregister(&self) -> Result<(), JoeError> {
        let instances = std::mem::take(&mut *self.instances.lock().await);
        for instance_id in instances {
            if let Err(e) = self.platform.destroy_instance(&instance_id).await {
                warn!(
                    instance_id = instance_id.as_str(),
                    error = %e,
                    "failed to deregister Database Lab instance"
                );
            }
        }
        Ok(())
    }

    async fn add_channel(
        &self,
        channel: &ChannelConfig,
        dblab: Arc<dyn DblabClient>,
    ) -> Result<(), JoeError> {
        let mut service_config = ServiceConfig::from_config(&self.config, TRANSPORT_WEBUI, channel);

        let instance_id = self
            .platform
            .create_instance(&service_config.project, dblab.url())
            .await?;
        info!(
            channel_id = channel.channel_id.as_str(),
            instance_id = instance_id.as_str(),
            "Database Lab instance registered"
        );
        self.instances.lock().await.push(instance_id.clone());
        service_config.platform_instance_id = Some(instance_id);

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
