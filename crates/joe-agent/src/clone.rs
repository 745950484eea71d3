// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clone acquisition and release.
//!
//! [`CloneManager`] owns the link between a [`Session`] and the Database Lab
//! instance of its channel: it requests clones with generated credentials,
//! opens the connection, and tears both down again.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use joe_core::types::{CloneInfo, ConnectionParams, CreateCloneRequest, DblabParams};
use joe_core::{ConnectionFactory, DblabClient, JoeError};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionState};

const USERNAME_PREFIX: &str = "joe_";
const PASSWORD_LEN: usize = 24;

/// Outcome of restoring a persisted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Connection reopened.
    Restored,
    /// Nothing to restore.
    NoClone,
    /// Clone gone or changed; the session was cleared.
    Dropped,
}

pub struct CloneManager {
    dblab: Arc<dyn DblabClient>,
    connections: Arc<dyn ConnectionFactory>,
    params: DblabParams,
    instance_limit: u32,
    active: AtomicU32,
}

impl CloneManager {
    pub fn new(
        dblab: Arc<dyn DblabClient>,
        connections: Arc<dyn ConnectionFactory>,
        params: DblabParams,
        instance_limit: u32,
    ) -> Self {
        Self {
            dblab,
            connections,
            params,
            instance_limit,
            active: AtomicU32::new(0),
        }
    }

    pub fn dblab(&self) -> &Arc<dyn DblabClient> {
        &self.dblab
    }

    pub fn connections(&self) -> &Arc<dyn ConnectionFactory> {
        &self.connections
    }

    pub fn dblab_params(&self) -> &DblabParams {
        &self.params
    }

    /// Number of clones currently held through this manager.
    pub fn active_clones(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    /// Makes sure the session holds a live clone.
    ///
    /// Returns the clone info when a new clone was acquired, `None` when the
    /// existing one is still usable.
    pub async fn ensure_clone(&self, session: &mut Session) -> Result<Option<CloneInfo>, JoeError> {
        match session.state() {
            SessionState::Active => {
                if let Some(clone_id) = session.clone_id()
                    && self.is_active(clone_id).await
                {
                    return Ok(None);
                }
                info!(clone_id = ?session.clone_id(), "clone is no longer usable, acquiring a new one");
                self.stop_session(session).await;
            }
            SessionState::Detached => {
                if self.restore(session).await? == RestoreOutcome::Restored {
                    return Ok(None);
                }
            }
            SessionState::Empty => {}
        }

        self.acquire(session).await.map(Some)
    }

    async fn acquire(&self, session: &mut Session) -> Result<CloneInfo, JoeError> {
        self.reserve_slot()?;

        match self.create_and_connect(session).await {
            Ok(clone) => Ok(clone),
            Err(e) => {
                self.release_slot();
                Err(e)
            }
        }
    }

    async fn create_and_connect(&self, session: &mut Session) -> Result<CloneInfo, JoeError> {
        let request = generate_request();
        let clone = self.dblab.create_clone(&request).await?;
        debug!(clone_id = %clone.id, "clone created");

        let params = self.connection_params(&clone, &request.username, &request.password);
        let connection = match self.connections.connect(&params).await {
            Ok(connection) => connection,
            Err(e) => {
                if let Err(destroy_err) = self.dblab.destroy_clone(&clone.id).await {
                    warn!(clone_id = %clone.id, error = %destroy_err, "failed to destroy unreachable clone");
                }
                return Err(e);
            }
        };

        session.attach(
            clone.id.clone(),
            params,
            connection,
            clone.metadata.max_idle_minutes,
        );
        info!(
            clone_id = %clone.id,
            channel_id = %session.channel_id,
            max_idle_minutes = clone.metadata.max_idle_minutes,
            "session started"
        );
        Ok(clone)
    }

    fn reserve_slot(&self) -> Result<(), JoeError> {
        if self.instance_limit == 0 {
            self.active.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        let limit = self.instance_limit;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                JoeError::session(format!(
                    "The limit of active sessions has been reached ({limit}). Please try again later"
                ))
            })
    }

    fn release_slot(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    fn connection_params(&self, clone: &CloneInfo, user: &str, password: &str) -> ConnectionParams {
        let host = if clone.db.host.is_empty() {
            host_of(self.dblab.url())
        } else {
            clone.db.host.clone()
        };

        ConnectionParams {
            host,
            port: clone.db.port.clone(),
            user: user.to_string(),
            password: password.to_string(),
            dbname: self.params.dbname.clone(),
            ssl_mode: self.params.ssl_mode.clone(),
        }
    }

    /// Whether the remote clone exists and reports status `OK`.
    pub async fn is_active(&self, clone_id: &str) -> bool {
        match self.dblab.get_clone(clone_id).await {
            Ok(clone) => clone.is_ok(),
            Err(e) => {
                debug!(clone_id, error = %e, "clone status check failed");
                false
            }
        }
    }

    /// Closes the connection and forgets the clone. The remote clone is kept.
    pub async fn stop_session(&self, session: &mut Session) {
        // Only sessions with an open connection hold a slot.
        let held = session.state() == SessionState::Active;
        let clone_id = session.clone_id().map(str::to_string);
        if let Some(connection) = session.detach() {
            connection.close().await;
        }
        if held {
            self.release_slot();
        }
        if clone_id.is_some() {
            debug!(clone_id = ?clone_id, "session stopped");
        }
    }

    /// Stops the session and destroys its remote clone.
    pub async fn destroy_session(&self, session: &mut Session) -> Result<(), JoeError> {
        let clone_id = session.clone_id().map(str::to_string);
        self.stop_session(session).await;

        if let Some(clone_id) = clone_id {
            self.dblab.destroy_clone(&clone_id).await?;
            info!(clone_id = %clone_id, "clone destroyed");
        }
        Ok(())
    }

    /// Resets the clone data. On failure the clone is replaced with a new one.
    pub async fn reset(&self, session: &mut Session) -> Result<Option<CloneInfo>, JoeError> {
        let Some(clone_id) = session.clone_id().map(str::to_string) else {
            return self.acquire(session).await.map(Some);
        };

        match self.dblab.reset_clone(&clone_id).await {
            Ok(()) => {
                self.reconnect(session).await?;
                Ok(None)
            }
            Err(e) => {
                warn!(clone_id = %clone_id, error = %e, "clone reset failed, rebooting session");
                if let Err(destroy_err) = self.destroy_session(session).await {
                    warn!(clone_id = %clone_id, error = %destroy_err, "failed to destroy clone");
                }
                self.acquire(session).await.map(Some)
            }
        }
    }

    /// Reopens the connection of an attached clone.
    ///
    /// The old connection is closed only once the new one is open. When the
    /// clone cannot be reached the session is torn down, so the next command
    /// acquires a fresh clone.
    async fn reconnect(&self, session: &mut Session) -> Result<(), JoeError> {
        let Some(params) = session.connection_params().cloned() else {
            return Err(JoeError::session("session has no connection parameters"));
        };
        let connection = match self.connections.connect(&params).await {
            Ok(connection) => connection,
            Err(e) => {
                let clone_id = session.clone_id().map(str::to_string);
                warn!(clone_id = ?clone_id, error = %e, "reconnect after reset failed, dropping clone");
                if let Err(destroy_err) = self.destroy_session(session).await {
                    warn!(clone_id = ?clone_id, error = %destroy_err, "failed to destroy clone");
                }
                return Err(e);
            }
        };
        if let Some(old) = session.connection() {
            old.close().await;
        }
        session.replace_connection(connection);
        Ok(())
    }

    /// Re-validates a session read back from the session store.
    pub async fn restore(&self, session: &mut Session) -> Result<RestoreOutcome, JoeError> {
        let (Some(clone_id), Some(params)) = (
            session.clone_id().map(str::to_string),
            session.connection_params().cloned(),
        ) else {
            session.detach();
            return Ok(RestoreOutcome::NoClone);
        };

        let clone = match self.dblab.get_clone(&clone_id).await {
            Ok(clone) if clone.is_ok() => clone,
            Ok(clone) => {
                info!(clone_id = %clone_id, status = %clone.status, "dropping session of unusable clone");
                session.detach();
                return Ok(RestoreOutcome::Dropped);
            }
            Err(e) => {
                info!(clone_id = %clone_id, error = %e, "dropping session of missing clone");
                session.detach();
                return Ok(RestoreOutcome::Dropped);
            }
        };

        let expected = self.connection_params(&clone, &params.user, &params.password);
        if expected.host != params.host || expected.port != params.port || expected.dbname != params.dbname {
            info!(clone_id = %clone_id, "connection parameters changed, dropping session");
            session.detach();
            return Ok(RestoreOutcome::Dropped);
        }

        self.reserve_slot()?;
        let connection = match self.connections.connect(&params).await {
            Ok(connection) => connection,
            Err(e) => {
                self.release_slot();
                warn!(clone_id = %clone_id, error = %e, "failed to reopen clone connection");
                session.detach();
                return Ok(RestoreOutcome::Dropped);
            }
        };

        if clone.metadata.max_idle_minutes > 0 {
            session.idle_limit_minutes = clone.metadata.max_idle_minutes;
        }
        let idle = session.idle_limit_minutes;
        session.attach(clone_id.clone(), params, connection, idle);
        info!(clone_id = %clone_id, "session restored");
        Ok(RestoreOutcome::Restored)
    }
}

/// Clone managers of one transport's channels, by channel id.
///
/// Used to release a session through the manager of the channel it was
/// opened in.
#[derive(Clone, Default)]
pub struct CloneDirectory {
    managers: Arc<RwLock<HashMap<String, Arc<CloneManager>>>>,
}

impl CloneDirectory {
    pub async fn insert(&self, channel_id: impl Into<String>, manager: Arc<CloneManager>) {
        self.managers.write().await.insert(channel_id.into(), manager);
    }

    pub async fn get(&self, channel_id: &str) -> Option<Arc<CloneManager>> {
        self.managers.read().await.get(channel_id).cloned()
    }
}

fn generate_request() -> CreateCloneRequest {
    let mut rng = rand::thread_rng();
    let suffix: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    let password: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect();

    CreateCloneRequest {
        id: format!("joe-{}", uuid::Uuid::new_v4().simple()),
        protected: false,
        username: format!("{USERNAME_PREFIX}{suffix}"),
        password,
    }
}

fn host_of(dblab_url: &str) -> String {
    url::Url::parse(dblab_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
