// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles a processor registry with mock collaborators and
//! a manual clock. `send()` drives one message through the full pipeline on
//! the caller's task, so assertions can follow immediately.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use joe_agent::{
    BasicPlanAnalyzer, EditionPack, ProcessingService, ProcessorRegistry, ServiceConfig,
    ServiceDeps, SharedState, StoppedSession,
};
use joe_config::model::EstimatorConfig;
use joe_core::types::{DblabParams, IncomingMessage};
use joe_core::{JoeError, ManualClock};
use tokio_util::sync::CancellationToken;

use crate::mock_dblab::MockDblab;
use crate::mock_informer::{BasicValidator, StaticInformer};
use crate::mock_messenger::MockMessenger;
use crate::mock_platform::MockPlatform;
use crate::mock_postgres::{MockConnectionFactory, MockPsql};

pub const TEST_TRANSPORT: &str = "test";
pub const TEST_VERSION: &str = "v1.0.0";
pub const DEFAULT_CHANNEL: &str = "C1";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    channels: Vec<String>,
    quota_limit: u32,
    quota_interval_secs: u64,
    history_enabled: bool,
    audit_enabled: bool,
    instance_limit: u32,
    enterprise: bool,
    permalink: Option<String>,
    max_idle_minutes: u32,
    min_notify_secs: u64,
    informer: StaticInformer,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            channels: vec![DEFAULT_CHANNEL.to_string()],
            quota_limit: 10,
            quota_interval_secs: 60,
            history_enabled: true,
            audit_enabled: false,
            instance_limit: 0,
            enterprise: false,
            permalink: None,
            max_idle_minutes: crate::mock_dblab::DEFAULT_MAX_IDLE_MINUTES,
            min_notify_secs: 60,
            informer: StaticInformer::new(),
        }
    }

    /// Channels served by the transport; the first one is the default.
    pub fn with_channels(mut self, channels: &[&str]) -> Self {
        self.channels = channels.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_quota(mut self, limit: u32, interval_secs: u64) -> Self {
        self.quota_limit = limit;
        self.quota_interval_secs = interval_secs;
        self
    }

    pub fn with_history(mut self, enabled: bool) -> Self {
        self.history_enabled = enabled;
        self
    }

    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    pub fn with_instance_limit(mut self, limit: u32) -> Self {
        self.instance_limit = limit;
        self
    }

    pub fn enterprise(mut self) -> Self {
        self.enterprise = true;
        self
    }

    pub fn with_permalink(mut self, url: &str) -> Self {
        self.permalink = Some(url.to_string());
        self
    }

    pub fn with_max_idle_minutes(mut self, minutes: u32) -> Self {
        self.max_idle_minutes = minutes;
        self
    }

    pub fn with_min_notify_secs(mut self, secs: u64) -> Self {
        self.min_notify_secs = secs;
        self
    }

    pub fn with_user(mut self, id: &str, display_name: &str, real_name: &str) -> Self {
        self.informer = self.informer.with_user(id, display_name, real_name);
        self
    }

    /// Build the harness and register every channel.
    pub async fn build(self) -> TestHarness {
        let messenger = Arc::new(MockMessenger::new());
        let dblab = Arc::new(MockDblab::new().with_max_idle_minutes(self.max_idle_minutes));
        let platform = Arc::new(match &self.permalink {
            Some(url) => MockPlatform::new().with_permalink(url),
            None => MockPlatform::new(),
        });
        let connections = Arc::new(MockConnectionFactory::new());
        let psql = Arc::new(MockPsql::new());
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).single().unwrap_or_default();
        let clock = Arc::new(ManualClock::new(start));
        let cancel = CancellationToken::new();

        let edition = if self.enterprise {
            EditionPack::enterprise(EstimatorConfig::default())
        } else {
            EditionPack::community()
        };

        let deps = ServiceDeps {
            messenger: messenger.clone(),
            validator: Arc::new(BasicValidator),
            informer: Arc::new(self.informer),
            platform: Some(platform.clone()),
            connections: connections.clone(),
            analyzer: Arc::new(BasicPlanAnalyzer),
            psql: psql.clone(),
            edition,
            clock: clock.clone(),
        };

        let shared = SharedState::new(&deps, self.quota_limit, self.quota_interval_secs);
        let processors = ProcessorRegistry::new(TEST_TRANSPORT);
        for channel_id in &self.channels {
            let config = ServiceConfig {
                transport: TEST_TRANSPORT.to_string(),
                channel_id: channel_id.clone(),
                project: "test-project".to_string(),
                version: TEST_VERSION.to_string(),
                min_notify_secs: self.min_notify_secs,
                quota_limit: self.quota_limit,
                quota_interval_secs: self.quota_interval_secs,
                audit_enabled: self.audit_enabled,
                history_enabled: self.history_enabled,
                unfurl_links: false,
                instance_limit: self.instance_limit,
                dblab_params: DblabParams::default(),
                platform_instance_id: None,
            };
            let service = ProcessingService::with_shared(
                config,
                deps.clone(),
                dblab.clone(),
                shared.clone(),
                cancel.clone(),
            );
            processors.add(service).await;
        }

        TestHarness {
            processors,
            default_channel: self.channels.first().cloned().unwrap_or_default(),
            messenger,
            dblab,
            platform,
            connections,
            psql,
            clock,
            cancel,
        }
    }
}

/// A complete pipeline with mock collaborators.
pub struct TestHarness {
    pub processors: ProcessorRegistry,
    pub default_channel: String,
    pub messenger: Arc<MockMessenger>,
    pub dblab: Arc<MockDblab>,
    pub platform: Arc<MockPlatform>,
    pub connections: Arc<MockConnectionFactory>,
    pub psql: Arc<MockPsql>,
    pub clock: Arc<ManualClock>,
    pub cancel: CancellationToken,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A message from `user_id` in the default channel.
    pub fn incoming(&self, user_id: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            text: text.to_string(),
            user_id: user_id.to_string(),
            channel_id: self.default_channel.clone(),
            timestamp: "1700000000.000100".to_string(),
            ..IncomingMessage::default()
        }
    }

    /// Processes `text` from `user_id` in the default channel.
    pub async fn send(&self, user_id: &str, text: &str) -> Result<(), JoeError> {
        let incoming = self.incoming(user_id, text);
        self.process(incoming).await
    }

    pub async fn send_in(&self, channel_id: &str, user_id: &str, text: &str) -> Result<(), JoeError> {
        let mut incoming = self.incoming(user_id, text);
        incoming.channel_id = channel_id.to_string();
        self.process(incoming).await
    }

    pub async fn process(&self, incoming: IncomingMessage) -> Result<(), JoeError> {
        let service = self.service(&incoming.channel_id).await?;
        service.process_message(incoming).await
    }

    pub async fn service(&self, channel_id: &str) -> Result<Arc<ProcessingService>, JoeError> {
        self.processors
            .get(channel_id)
            .await
            .ok_or_else(|| JoeError::Internal(format!("channel {channel_id} is not registered")))
    }

    /// Clone id currently held by the user, if any.
    pub async fn clone_of(&self, user_id: &str) -> Option<String> {
        let service = self.service(&self.default_channel).await.ok()?;
        let user = service.users().get(user_id).await?;
        let session = user.session.lock().await;
        session.clone_id().map(str::to_string)
    }

    pub async fn check_idle_sessions(&self) -> Vec<StoppedSession> {
        self.processors.check_idle_sessions().await
    }
}
