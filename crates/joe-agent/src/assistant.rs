// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport contract and the per-channel processor registry.
//!
//! Every chat transport implements [`Assistant`] and owns a
//! [`ProcessorRegistry`] mapping its channel ids to [`ProcessingService`]s.
//! Reaping, restoring and dumping sessions fan out over that registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use joe_config::model::ChannelConfig;
use joe_core::types::IncomingMessage;
use joe_core::{DblabClient, JoeError};
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::clone::RestoreOutcome;
use crate::pipeline::ProcessingService;
use crate::reaper::StoppedSession;
use crate::store::{SessionStore, StoredUser, StoredUsers};
use crate::users::User;

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Transport name as written in `channel_mapping.communication_types`.
    fn transport(&self) -> &str;

    /// Checks credentials and prepares transport handlers.
    async fn init(&self) -> Result<(), JoeError>;

    /// Starts background loops. They stop with the transport's token.
    async fn register(&self) -> Result<(), JoeError>;

    /// Stops background loops and releases transport resources.
    async fn deregister(&self) -> Result<(), JoeError>;

    /// Attaches a processing service for one configured channel.
    async fn add_channel(
        &self,
        channel: &ChannelConfig,
        dblab: Arc<dyn DblabClient>,
    ) -> Result<(), JoeError>;

    fn processors(&self) -> &ProcessorRegistry;

    async fn check_idle_sessions(&self) -> Vec<StoppedSession> {
        self.processors().check_idle_sessions().await
    }

    async fn restore_sessions(&self, store: &SessionStore) -> Result<(), JoeError> {
        self.processors().restore_sessions(store).await;
        Ok(())
    }

    async fn dump_sessions(&self, store: &mut SessionStore) {
        self.processors().dump_sessions(store).await;
    }
}

/// Counts of a restore pass, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub users: usize,
    pub restored: usize,
    pub dropped: usize,
}

pub struct ProcessorRegistry {
    transport: String,
    processors: RwLock<HashMap<String, Arc<ProcessingService>>>,
    tasks: TaskTracker,
}

impl ProcessorRegistry {
    pub fn new(transport: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            processors: RwLock::new(HashMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Tracker of in-flight processing tasks.
    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    pub async fn add(&self, service: ProcessingService) -> Arc<ProcessingService> {
        let channel_id = service.config().channel_id.clone();
        service
            .shared()
            .clones
            .insert(channel_id.clone(), Arc::clone(service.clones()))
            .await;
        let service = Arc::new(service);
        let previous = self
            .processors
            .write()
            .await
            .insert(channel_id.clone(), Arc::clone(&service));
        if previous.is_some() {
            warn!(
                transport = self.transport.as_str(),
                channel_id = channel_id.as_str(),
                "channel registered twice, replacing processor"
            );
        }
        info!(
            transport = self.transport.as_str(),
            channel_id = channel_id.as_str(),
            "channel registered"
        );
        service
    }

    pub async fn get(&self, channel_id: &str) -> Option<Arc<ProcessingService>> {
        self.processors.read().await.get(channel_id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<ProcessingService>> {
        self.processors.read().await.values().cloned().collect()
    }

    pub async fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.processors.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.processors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processors.read().await.is_empty()
    }

    /// Spawns processing of `incoming` on the channel's service.
    ///
    /// Returns `false` when no service is registered for the channel.
    pub async fn dispatch(&self, incoming: IncomingMessage) -> bool {
        let Some(service) = self.get(&incoming.channel_id).await else {
            debug!(
                transport = self.transport.as_str(),
                channel_id = incoming.channel_id.as_str(),
                "no processor for channel"
            );
            return false;
        };
        self.tasks.spawn(async move { service.handle(incoming).await });
        true
    }

    pub async fn check_idle_sessions(&self) -> Vec<StoppedSession> {
        let mut stopped = Vec::new();
        for service in self.all().await {
            stopped.extend(service.check_idle_sessions().await);
        }
        stopped
    }

    /// Loads persisted users and revalidates their clones.
    pub async fn restore_sessions(&self, store: &SessionStore) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        for service in self.all().await {
            let channel_id = service.config().channel_id.clone();
            let stored = store.get_users(&self.transport, &channel_id);

            for (user_id, StoredUser { info, mut session }) in stored {
                summary.users += 1;
                match service.clones().restore(&mut session).await {
                    Ok(RestoreOutcome::Restored) => summary.restored += 1,
                    Ok(RestoreOutcome::Dropped) => summary.dropped += 1,
                    Ok(RestoreOutcome::NoClone) => {}
                    Err(e) => {
                        warn!(
                            user_id = user_id.as_str(),
                            channel_id = channel_id.as_str(),
                            error = %e,
                            "failed to restore session"
                        );
                        session.detach();
                        summary.dropped += 1;
                    }
                }
                service.users().insert(User::new(info, session)).await;
            }
        }

        info!(
            transport = self.transport.as_str(),
            users = summary.users,
            restored = summary.restored,
            dropped = summary.dropped,
            "sessions restored"
        );
        summary
    }

    /// Copies every processor's users into `store`.
    pub async fn dump_sessions(&self, store: &mut SessionStore) {
        for service in self.all().await {
            let mut users = StoredUsers::new();
            for (user_id, user) in service.users().snapshot().await {
                let session = user.session.lock().await.clone();
                if !service.owns(&session) {
                    continue;
                }
                users.insert(
                    user_id,
                    StoredUser {
                        info: user.info.clone(),
                        session,
                    },
                );
            }
            debug!(
                transport = self.transport.as_str(),
                channel_id = service.config().channel_id.as_str(),
                users = users.len(),
                "sessions dumped"
            );
            store.set_users(&self.transport, &service.config().channel_id, users);
        }
    }
}
