// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed session store.
//!
//! The blob is a JSON object keyed by `"{transport}-{channel_id}"`, each
//! value mapping user ids to the user identity and session. Writes replace
//! the whole file through a temp file in the same directory.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use joe_core::JoeError;
use joe_core::types::UserInfo;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::session::Session;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub info: UserInfo,
    pub session: Session,
}

pub type StoredUsers = HashMap<String, StoredUser>;

#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    channels: HashMap<String, StoredUsers>,
}

fn channel_key(transport: &str, channel_id: &str) -> String {
    format!("{transport}-{channel_id}")
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            channels: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_users(&self, transport: &str, channel_id: &str) -> StoredUsers {
        self.channels
            .get(&channel_key(transport, channel_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_users(&mut self, transport: &str, channel_id: &str, users: StoredUsers) {
        let key = channel_key(transport, channel_id);
        if users.is_empty() {
            self.channels.remove(&key);
        } else {
            self.channels.insert(key, users);
        }
    }

    /// Reads the blob. A missing file is an empty store.
    pub fn load(&mut self) -> Result<(), JoeError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved sessions");
                self.channels.clear();
                return Ok(());
            }
            Err(e) => {
                return Err(JoeError::Internal(format!(
                    "failed to read sessions from {}: {e}",
                    self.path.display()
                )));
            }
        };

        if data.trim().is_empty() {
            self.channels.clear();
            return Ok(());
        }

        self.channels = serde_json::from_str(&data).map_err(|e| {
            JoeError::Internal(format!(
                "failed to parse sessions from {}: {e}",
                self.path.display()
            ))
        })?;
        info!(
            path = %self.path.display(),
            channels = self.channels.len(),
            "loaded saved sessions"
        );
        Ok(())
    }

    /// Writes the blob atomically.
    pub fn save(&self) -> Result<(), JoeError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| {
            JoeError::Internal(format!("failed to create {}: {e}", dir.display()))
        })?;

        let json = serde_json::to_vec_pretty(&self.channels)
            .map_err(|e| JoeError::Internal(format!("failed to encode sessions: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| JoeError::Internal(format!("failed to create temp file: {e}")))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.flush())
            .map_err(|e| JoeError::Internal(format!("failed to write sessions: {e}")))?;
        tmp.persist(&self.path).map_err(|e| {
            JoeError::Internal(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        info!(path = %self.path.display(), channels = self.channels.len(), "saved sessions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::Quota;
    use chrono::Utc;

    fn stored(user_id: &str, channel_id: &str) -> StoredUser {
        StoredUser {
            info: UserInfo::from_id(user_id),
            session: Session::new(channel_id, false, Quota::new(10, 60), Utc::now()),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path().join("absent.json"));
        store.load().unwrap();
        assert!(store.get_users("slack", "C1").is_empty());
    }

    #[test]
    fn save_then_load_round_trips_by_channel_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.json");

        let mut store = SessionStore::new(&path);
        let mut users = StoredUsers::new();
        users.insert("U1".into(), stored("U1", "C1"));
        store.set_users("slack", "C1", users);
        store.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"slack-C1\""));

        let mut reloaded = SessionStore::new(&path);
        reloaded.load().unwrap();
        let users = reloaded.get_users("slack", "C1");
        assert_eq!(users.len(), 1);
        assert_eq!(users["U1"].session.channel_id, "C1");
        assert!(reloaded.get_users("webui", "C1").is_empty());
    }

    #[test]
    fn empty_user_map_removes_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path().join("s.json"));
        let mut users = StoredUsers::new();
        users.insert("U1".into(), stored("U1", "C1"));
        store.set_users("slack", "C1", users);
        store.set_users("slack", "C1", StoredUsers::new());
        store.save().unwrap();

        let mut reloaded = SessionStore::new(store.path());
        reloaded.load().unwrap();
        assert!(reloaded.get_users("slack", "C1").is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut store = SessionStore::new(&path);
        assert!(store.load().is_err());
    }
}
