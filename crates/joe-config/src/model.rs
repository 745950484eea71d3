// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Joe assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::collections::BTreeMap;

use joe_core::DblabParams;
use serde::{Deserialize, Serialize};

/// Transport names accepted under `channel_mapping.communication_types`.
pub const TRANSPORT_SLACK: &str = "slack";
pub const TRANSPORT_SLACK_SOCKET_MODE: &str = "slacksm";
pub const TRANSPORT_WEBUI: &str = "webui";

/// Legacy transport that is no longer supported.
pub const TRANSPORT_SLACK_RTM: &str = "slackrtm";

/// Accepted `sslmode` values.
pub const SSL_MODES: &[&str] = &[
    "disable",
    "allow",
    "prefer",
    "require",
    "verify-ca",
    "verify-full",
];

/// Top-level Joe configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JoeConfig {
    #[serde(default)]
    pub app: AppConfig,

    /// History platform settings.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Quota, audit, clone limits and the timing estimator.
    #[serde(default)]
    pub enterprise: EnterpriseConfig,

    /// Database lab servers and the channels bound to them.
    #[serde(default)]
    pub channel_mapping: ChannelMappingConfig,
}

impl JoeConfig {
    /// Workspaces configured for a transport, empty when absent.
    pub fn workspaces(&self, transport: &str) -> &[WorkspaceConfig] {
        self.channel_mapping
            .communication_types
            .get(transport)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of channels across all transports.
    pub fn channel_count(&self) -> usize {
        self.channel_mapping
            .communication_types
            .values()
            .flatten()
            .map(|ws| ws.channels.len())
            .sum()
    }
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Listen address of the HTTP server (events callback, web UI).
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Verbose logging.
    #[serde(default)]
    pub debug: bool,

    /// Seconds after which a completed command mentions its author.
    #[serde(default = "default_min_notify_duration")]
    pub min_notify_duration: u64,

    /// File that holds sessions across restarts.
    #[serde(default = "default_sessions_path")]
    pub sessions_path: String,

    /// Version string reported in help output.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            min_notify_duration: default_min_notify_duration(),
            sessions_path: default_sessions_path(),
            version: default_version(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2400
}

fn default_min_notify_duration() -> u64 {
    60
}

fn default_sessions_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("joe").join("sessions.json").display().to_string())
        .unwrap_or_else(|| "sessions.json".to_string())
}

fn default_version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

/// History platform settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Base URL of the platform API.
    #[serde(default = "default_platform_url")]
    pub url: String,

    /// `Access-Token` used for every platform call.
    #[serde(default)]
    pub token: Option<String>,

    /// Project that sessions are recorded under.
    #[serde(default)]
    pub project: String,

    /// Persist command records.
    #[serde(default)]
    pub history_enabled: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: default_platform_url(),
            token: None,
            project: String::new(),
            history_enabled: false,
        }
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("project", &self.project)
            .field("history_enabled", &self.history_enabled)
            .finish()
    }
}

fn default_platform_url() -> String {
    "https://postgres.ai/api/general".to_string()
}

/// Settings that the enterprise pack acts on.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnterpriseConfig {
    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub dblab: DblabLimitsConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,
}

/// Per-user request limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Requests admitted per window.
    #[serde(default = "default_quota_limit")]
    pub limit: u32,

    /// Window length in seconds.
    #[serde(default = "default_quota_interval")]
    pub interval: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limit: default_quota_limit(),
            interval: default_quota_interval(),
        }
    }
}

fn default_quota_limit() -> u32 {
    10
}

fn default_quota_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DblabLimitsConfig {
    /// Maximum concurrently held clones per channel; 0 means unlimited.
    #[serde(default)]
    pub instance_limit: u32,
}

/// Wait-event timing estimator parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Production-to-clone ratio for read IO time.
    #[serde(default = "default_ratio")]
    pub read_ratio: f64,

    /// Production-to-clone ratio for write IO time.
    #[serde(default = "default_ratio")]
    pub write_ratio: f64,

    /// Sampling period in milliseconds.
    #[serde(default = "default_profiling_interval")]
    pub profiling_interval: u64,

    /// Minimum number of samples for an estimate.
    #[serde(default = "default_sample_threshold")]
    pub sample_threshold: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            read_ratio: default_ratio(),
            write_ratio: default_ratio(),
            profiling_interval: default_profiling_interval(),
            sample_threshold: default_sample_threshold(),
        }
    }
}

fn default_ratio() -> f64 {
    1.0
}

fn default_profiling_interval() -> u64 {
    10
}

fn default_sample_threshold() -> u32 {
    20
}

/// Database lab servers and per-transport workspaces.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelMappingConfig {
    #[serde(default)]
    pub dblab_servers: BTreeMap<String, DblabServerConfig>,

    /// Keyed by transport name (`slack`, `slacksm`, `webui`).
    #[serde(default)]
    pub communication_types: BTreeMap<String, Vec<WorkspaceConfig>>,
}

/// A database lab instance.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DblabServerConfig {
    pub url: String,

    #[serde(default)]
    pub token: String,
}

impl std::fmt::Debug for DblabServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DblabServerConfig")
            .field("url", &self.url)
            .field("token", &"[redacted]")
            .finish()
    }
}

/// One chat workspace of a transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Transport credentials. Which fields are required depends on the transport.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub app_level_token: Option<String>,

    #[serde(default)]
    pub signing_secret: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field(
                "app_level_token",
                &self.app_level_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// A chat channel served by a database lab instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub channel_id: String,

    #[serde(default)]
    pub project: String,

    /// Key into `channel_mapping.dblab_servers`.
    pub dblab_server: String,

    #[serde(default)]
    pub dblab_params: DblabParamsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DblabParamsConfig {
    #[serde(default = "default_dbname")]
    pub dbname: String,

    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

impl Default for DblabParamsConfig {
    fn default() -> Self {
        Self {
            dbname: default_dbname(),
            sslmode: default_sslmode(),
        }
    }
}

impl From<&DblabParamsConfig> for DblabParams {
    fn from(cfg: &DblabParamsConfig) -> Self {
        DblabParams {
            dbname: cfg.dbname.clone(),
            ssl_mode: cfg.sslmode.clone(),
        }
    }
}

fn default_dbname() -> String {
    "postgres".to_string()
}

fn default_sslmode() -> String {
    "prefer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = JoeConfig::default();
        assert_eq!(config.app.port, 2400);
        assert_eq!(config.app.min_notify_duration, 60);
        assert_eq!(config.enterprise.quota.limit, 10);
        assert_eq!(config.enterprise.quota.interval, 60);
        assert_eq!(config.enterprise.dblab.instance_limit, 0);
        assert_eq!(config.enterprise.estimator.profiling_interval, 10);
        assert_eq!(config.enterprise.estimator.sample_threshold, 20);
        assert!(!config.platform.history_enabled);
        assert!(config.app.version.starts_with('v'));
    }

    #[test]
    fn channel_mapping_deserializes() {
        let toml_str = r#"
[channel_mapping.dblab_servers.prod1]
url = "https://dblab.example.com"
token = "secret"

[[channel_mapping.communication_types.slack]]
name = "Workspace"

[channel_mapping.communication_types.slack.credentials]
access_token = "xoxb-1"
signing_secret = "shh"

[[channel_mapping.communication_types.slack.channels]]
channel_id = "C01"
project = "demo"
dblab_server = "prod1"

[channel_mapping.communication_types.slack.channels.dblab_params]
dbname = "app"
sslmode = "require"
"#;
        let config: JoeConfig = toml::from_str(toml_str).unwrap();
        let slack = config.workspaces(TRANSPORT_SLACK);
        assert_eq!(slack.len(), 1);
        assert_eq!(slack[0].channels[0].channel_id, "C01");
        assert_eq!(slack[0].channels[0].dblab_params.dbname, "app");
        assert_eq!(config.channel_count(), 1);
        assert!(config.workspaces(TRANSPORT_WEBUI).is_empty());

        let params = DblabParams::from(&slack[0].channels[0].dblab_params);
        assert_eq!(params.ssl_mode, "require");
    }

    #[test]
    fn dblab_params_default_when_omitted() {
        let toml_str = r#"
[[channel_mapping.communication_types.webui]]
[[channel_mapping.communication_types.webui.channels]]
channel_id = "ProductionDB"
dblab_server = "prod1"
"#;
        let config: JoeConfig = toml::from_str(toml_str).unwrap();
        let channel = &config.workspaces(TRANSPORT_WEBUI)[0].channels[0];
        assert_eq!(channel.dblab_params.dbname, "postgres");
        assert_eq!(channel.dblab_params.sslmode, "prefer");
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let creds = CredentialsConfig {
            access_token: Some("xoxb-secret".into()),
            app_level_token: None,
            signing_secret: Some("signing".into()),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("xoxb-secret"));
        assert!(!debug.contains("signing\""));
        assert!(debug.contains("[redacted]"));

        let platform = PlatformConfig {
            token: Some("platform-token".into()),
            ..PlatformConfig::default()
        };
        assert!(!format!("{platform:?}").contains("platform-token"));
    }

    #[test]
    fn unknown_channel_field_is_rejected() {
        let toml_str = r#"
[[channel_mapping.communication_types.slack]]
[[channel_mapping.communication_types.slack.channels]]
channel_id = "C01"
dblab_server = "prod1"
dblab_instance = "typo"
"#;
        assert!(toml::from_str::<JoeConfig>(toml_str).is_err());
    }
}
