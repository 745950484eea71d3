// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory Database Lab.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use joe_core::types::{CLONE_STATUS_OK, CloneDb, CloneInfo, CloneMetadata, CreateCloneRequest};
use joe_core::{DblabClient, JoeError};

pub const DEFAULT_MAX_IDLE_MINUTES: u32 = 20;

#[derive(Default)]
struct State {
    clones: HashMap<String, CloneInfo>,
    created: Vec<CreateCloneRequest>,
    destroyed: Vec<String>,
    resets: Vec<String>,
    fail_resets: bool,
    fail_creates: bool,
    next_port: u16,
    /// Remaining healthy status checks before a clone turns unusable.
    expiring: HashMap<String, usize>,
}

/// Clones live in a map; every call is recorded.
pub struct MockDblab {
    url: String,
    host: String,
    max_idle_minutes: u32,
    state: Mutex<State>,
}

impl Default for MockDblab {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDblab {
    pub fn new() -> Self {
        Self {
            url: "https://dblab.test".to_string(),
            host: "dblab.test".to_string(),
            max_idle_minutes: DEFAULT_MAX_IDLE_MINUTES,
            state: Mutex::new(State {
                next_port: 6000,
                ..State::default()
            }),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Host reported in clone details; empty makes clones report none.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn with_max_idle_minutes(mut self, minutes: u32) -> Self {
        self.max_idle_minutes = minutes;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests passed to `create_clone`, in order.
    pub fn created(&self) -> Vec<CreateCloneRequest> {
        self.state().created.clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.state().destroyed.clone()
    }

    pub fn resets(&self) -> Vec<String> {
        self.state().resets.clone()
    }

    /// Ids of clones currently known to the lab.
    pub fn clone_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().clones.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Changes the reported status of a clone.
    pub fn set_status(&self, clone_id: &str, status: &str) {
        if let Some(clone) = self.state().clones.get_mut(clone_id) {
            clone.status = status.to_string();
        }
    }

    /// Drops the clone without recording a destroy, as if the lab lost it.
    pub fn forget(&self, clone_id: &str) {
        self.state().clones.remove(clone_id);
    }

    /// The clone answers `checks` more status requests as usable, then fails.
    pub fn expire_after_checks(&self, clone_id: &str, checks: usize) {
        self.state().expiring.insert(clone_id.to_string(), checks);
    }

    pub fn fail_resets(&self, fail: bool) {
        self.state().fail_resets = fail;
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state().fail_creates = fail;
    }
}

#[async_trait]
impl DblabClient for MockDblab {
    async fn create_clone(&self, req: &CreateCloneRequest) -> Result<CloneInfo, JoeError> {
        let mut state = self.state();
        if state.fail_creates {
            return Err(JoeError::integration("dblab", "no capacity for new clones"));
        }
        state.created.push(req.clone());
        let port = state.next_port;
        state.next_port += 1;

        let clone = CloneInfo {
            id: req.id.clone(),
            status: CLONE_STATUS_OK.to_string(),
            db: CloneDb {
                host: self.host.clone(),
                port: port.to_string(),
                username: req.username.clone(),
                dbname: String::new(),
            },
            metadata: CloneMetadata {
                max_idle_minutes: self.max_idle_minutes,
                data_state_at: "2026-10-01 00:00:00 UTC".to_string(),
            },
        };
        state.clones.insert(clone.id.clone(), clone.clone());
        Ok(clone)
    }

    async fn get_clone(&self, clone_id: &str) -> Result<CloneInfo, JoeError> {
        let mut state = self.state();
        if let Some(remaining) = state.expiring.get_mut(clone_id) {
            if *remaining == 0 {
                state.expiring.remove(clone_id);
                if let Some(clone) = state.clones.get_mut(clone_id) {
                    clone.status = "FATAL".to_string();
                }
            } else {
                *remaining -= 1;
            }
        }
        state
            .clones
            .get(clone_id)
            .cloned()
            .ok_or_else(|| JoeError::integration("dblab", format!("clone {clone_id} not found")))
    }

    async fn reset_clone(&self, clone_id: &str) -> Result<(), JoeError> {
        let mut state = self.state();
        if state.fail_resets {
            return Err(JoeError::integration("dblab", "reset failed"));
        }
        if !state.clones.contains_key(clone_id) {
            return Err(JoeError::integration("dblab", format!("clone {clone_id} not found")));
        }
        state.resets.push(clone_id.to_string());
        Ok(())
    }

    async fn destroy_clone(&self, clone_id: &str) -> Result<(), JoeError> {
        let mut state = self.state();
        state.clones.remove(clone_id);
        state.destroyed.push(clone_id.to_string());
        Ok(())
    }

    fn url(&self) -> &str {
        &self.url
    }
}
