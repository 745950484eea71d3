// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user, per-channel session state.
//!
//! A session ties a clone, its connection and the user's quota together.
//! The clone handle and the open connection are set and cleared together;
//! the only exception is a session read back from disk, which carries a
//! handle without a connection until it is restored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use joe_core::SqlConnection;
use joe_core::types::ConnectionParams;
use serde::{Deserialize, Serialize};

use crate::quota::Quota;

/// Where a session is in its clone lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No clone held.
    Empty,
    /// Clone held with an open connection.
    Active,
    /// Clone handle loaded from disk, connection not yet reopened.
    Detached,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Empty => write!(f, "empty"),
            SessionState::Active => write!(f, "active"),
            SessionState::Detached => write!(f, "detached"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Platform history id; empty until the platform acknowledges the session.
    #[serde(default)]
    pub platform_session_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub direct: bool,
    #[serde(default)]
    clone_id: Option<String>,
    #[serde(default)]
    connection_params: Option<ConnectionParams>,
    #[serde(skip)]
    connection: Option<Arc<dyn SqlConnection>>,
    pub quota: Quota,
    pub last_action_at: DateTime<Utc>,
    #[serde(default)]
    pub idle_limit_minutes: u32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("platform_session_id", &self.platform_session_id)
            .field("channel_id", &self.channel_id)
            .field("direct", &self.direct)
            .field("clone_id", &self.clone_id)
            .field("connection_params", &self.connection_params)
            .field("state", &self.state())
            .field("quota", &self.quota)
            .field("last_action_at", &self.last_action_at)
            .field("idle_limit_minutes", &self.idle_limit_minutes)
            .finish()
    }
}

impl Session {
    pub fn new(channel_id: impl Into<String>, direct: bool, quota: Quota, now: DateTime<Utc>) -> Self {
        Self {
            platform_session_id: String::new(),
            channel_id: channel_id.into(),
            direct,
            clone_id: None,
            connection_params: None,
            connection: None,
            quota,
            last_action_at: now,
            idle_limit_minutes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.clone_id, &self.connection) {
            (None, _) => SessionState::Empty,
            (Some(_), Some(_)) => SessionState::Active,
            (Some(_), None) => SessionState::Detached,
        }
    }

    pub fn clone_id(&self) -> Option<&str> {
        self.clone_id.as_deref()
    }

    pub fn connection_params(&self) -> Option<&ConnectionParams> {
        self.connection_params.as_ref()
    }

    /// The open connection, if the session is active.
    pub fn connection(&self) -> Option<Arc<dyn SqlConnection>> {
        self.connection.clone()
    }

    pub fn has_clone(&self) -> bool {
        self.clone_id.is_some()
    }

    /// Binds a freshly acquired or restored clone to the session.
    pub fn attach(
        &mut self,
        clone_id: impl Into<String>,
        params: ConnectionParams,
        connection: Arc<dyn SqlConnection>,
        idle_limit_minutes: u32,
    ) {
        self.clone_id = Some(clone_id.into());
        self.connection_params = Some(params);
        self.connection = Some(connection);
        self.idle_limit_minutes = idle_limit_minutes;
    }

    /// Replaces the connection of an attached clone, e.g. after a reset.
    pub fn replace_connection(&mut self, connection: Arc<dyn SqlConnection>) {
        if self.clone_id.is_some() {
            self.connection = Some(connection);
        }
    }

    /// Clears everything tied to the clone and returns the connection to close.
    pub fn detach(&mut self) -> Option<Arc<dyn SqlConnection>> {
        self.clone_id = None;
        self.connection_params = None;
        self.platform_session_id.clear();
        self.connection.take()
    }

    /// Whole minutes since the last command.
    pub fn idle_minutes(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.last_action_at).num_minutes()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_action_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use joe_core::JoeError;
    use joe_core::types::QueryRows;

    struct NoopConnection;

    #[async_trait]
    impl SqlConnection for NoopConnection {
        async fn query(&self, _sql: &str, _params: &[&str]) -> Result<QueryRows, JoeError> {
            Ok(QueryRows::default())
        }
        async fn execute(&self, _sql: &str) -> Result<u64, JoeError> {
            Ok(0)
        }
        async fn server_version_num(&self) -> Result<u32, JoeError> {
            Ok(160000)
        }
        async fn close(&self) {}
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn session() -> Session {
        Session::new("C1", false, Quota::new(10, 60), now())
    }

    #[test]
    fn attach_and_detach_move_clone_and_connection_together() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Empty);

        s.attach("joe-1", ConnectionParams::default(), Arc::new(NoopConnection), 20);
        s.platform_session_id = "42".into();
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.clone_id(), Some("joe-1"));
        assert_eq!(s.idle_limit_minutes, 20);

        assert!(s.detach().is_some());
        assert_eq!(s.state(), SessionState::Empty);
        assert!(s.connection().is_none());
        assert!(s.connection_params().is_none());
        assert!(s.platform_session_id.is_empty());
    }

    #[test]
    fn persisted_session_comes_back_detached() {
        let mut s = session();
        s.attach("joe-1", ConnectionParams::default(), Arc::new(NoopConnection), 20);

        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("connection\""));
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state(), SessionState::Detached);
        assert_eq!(restored.clone_id(), Some("joe-1"));
        assert_eq!(restored.quota, s.quota);
    }

    #[test]
    fn replace_connection_requires_a_clone() {
        let mut s = session();
        s.replace_connection(Arc::new(NoopConnection));
        assert_eq!(s.state(), SessionState::Empty);
    }

    #[test]
    fn idle_minutes_are_whole_minutes() {
        let s = session();
        assert_eq!(s.idle_minutes(now() + Duration::seconds(119)), 1);
        assert_eq!(s.idle_minutes(now() + Duration::minutes(30)), 30);
    }

    #[test]
    fn debug_hides_credentials() {
        let mut s = session();
        let params = ConnectionParams {
            password: "hunter2".into(),
            ..ConnectionParams::default()
        };
        s.attach("joe-1", params, Arc::new(NoopConnection), 20);
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("active"));
    }
}
