// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types of the Database Lab API.

use joe_core::types::{CloneDb, CloneInfo, CloneMetadata};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateCloneBody<'a> {
    pub id: &'a str,
    pub protected: bool,
    pub db: DbCredentials<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClone {
    pub id: String,
    #[serde(default)]
    pub status: ApiStatus,
    #[serde(default)]
    pub db: ApiDb,
    #[serde(default)]
    pub metadata: ApiMetadata,
    #[serde(default)]
    pub snapshot: Option<ApiSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDb {
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "port_as_string")]
    pub port: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetadata {
    #[serde(default)]
    pub max_idle_minutes: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSnapshot {
    #[serde(default)]
    pub data_state_at: String,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detail: String,
}

/// Ports arrive as either numbers or strings depending on the server version.
fn port_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Num(u64),
        Text(String),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Num(n) => n.to_string(),
        Port::Text(s) => s,
    })
}

impl ApiClone {
    /// Converts the wire clone into the domain clone. `dbname` is filled by the caller.
    pub fn into_clone(self) -> CloneInfo {
        CloneInfo {
            id: self.id,
            status: self.status.code,
            db: CloneDb {
                host: self.db.host,
                port: self.db.port,
                username: self.db.username,
                dbname: String::new(),
            },
            metadata: CloneMetadata {
                max_idle_minutes: self.metadata.max_idle_minutes,
                data_state_at: self.snapshot.map(|s| s.data_state_at).unwrap_or_default(),
            },
        }
    }
}
