// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User registry.
//!
//! Lookups take the read lock; creation re-checks under the write lock so
//! concurrent first messages from one user resolve to the same [`User`].

use std::collections::HashMap;
use std::sync::Arc;

use joe_core::types::UserInfo;
use joe_core::{Clock, JoeError, UserInformer};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::quota::Quota;
use crate::session::Session;

/// A chat user and their session.
///
/// The session mutex is held for the whole processing of one message, which
/// serialises that user's commands in arrival order.
#[derive(Debug)]
pub struct User {
    pub info: UserInfo,
    pub session: Mutex<Session>,
}

impl User {
    pub fn new(info: UserInfo, session: Session) -> Self {
        Self {
            info,
            session: Mutex::new(session),
        }
    }
}

pub struct UserRegistry {
    users: RwLock<HashMap<String, Arc<User>>>,
    informer: Arc<dyn UserInformer>,
    clock: Arc<dyn Clock>,
    quota_limit: u32,
    quota_interval_secs: u64,
}

impl UserRegistry {
    pub fn new(
        informer: Arc<dyn UserInformer>,
        clock: Arc<dyn Clock>,
        quota_limit: u32,
        quota_interval_secs: u64,
    ) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            informer,
            clock,
            quota_limit,
            quota_interval_secs,
        }
    }

    /// Returns the user, creating it with a fresh session bound to `channel_id`.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        channel_id: &str,
        direct: bool,
    ) -> Result<Arc<User>, JoeError> {
        if let Some(user) = self.users.read().await.get(user_id) {
            return Ok(Arc::clone(user));
        }

        // Resolve the identity outside the lock; it is a network call.
        let info = self.informer.user_info(user_id).await?;

        let mut users = self.users.write().await;
        if let Some(user) = users.get(user_id) {
            return Ok(Arc::clone(user));
        }

        let session = Session::new(
            channel_id,
            direct,
            Quota::new(self.quota_limit, self.quota_interval_secs),
            self.clock.now(),
        );
        let user = Arc::new(User::new(info, session));
        users.insert(user_id.to_string(), Arc::clone(&user));
        debug!(user_id, channel_id, "registered user");
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Option<Arc<User>> {
        self.users.read().await.get(user_id).cloned()
    }

    /// Adds a user read back from the session store.
    pub async fn insert(&self, user: User) {
        self.users
            .write()
            .await
            .insert(user.info.id.clone(), Arc::new(user));
    }

    /// Point-in-time copy of the mapping.
    pub async fn snapshot(&self) -> HashMap<String, Arc<User>> {
        self.users.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}
