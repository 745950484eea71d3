// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Joe configuration system.

use joe_config::diagnostic::ConfigError;
use joe_config::model::{TRANSPORT_SLACK, TRANSPORT_SLACK_SOCKET_MODE, TRANSPORT_WEBUI};
use joe_config::{load_and_validate, load_and_validate_str, load_config_from_str};

const FULL: &str = r#"
[app]
host = "0.0.0.0"
port = 2500
debug = true
min_notify_duration = 30
sessions_path = "/var/lib/joe/sessions.json"
version = "v0.7.0"

[platform]
url = "https://platform.example.com/api"
token = "platform-token"
project = "demo"
history_enabled = true

[enterprise.quota]
limit = 3
interval = 10

[enterprise.audit]
enabled = true

[enterprise.dblab]
instance_limit = 2

[enterprise.estimator]
read_ratio = 1.5
write_ratio = 2.0
profiling_interval = 5
sample_threshold = 40

[channel_mapping.dblab_servers.prod1]
url = "https://dblab.example.com"
token = "dblab-token"

[[channel_mapping.communication_types.slack]]
name = "Main"
[channel_mapping.communication_types.slack.credentials]
access_token = "xoxb-1"
signing_secret = "slack-secret"
[[channel_mapping.communication_types.slack.channels]]
channel_id = "C01"
project = "demo"
dblab_server = "prod1"

[[channel_mapping.communication_types.slacksm]]
name = "Socket"
[channel_mapping.communication_types.slacksm.credentials]
access_token = "xoxb-2"
app_level_token = "xapp-2"
[[channel_mapping.communication_types.slacksm.channels]]
channel_id = "C02"
dblab_server = "prod1"

[[channel_mapping.communication_types.webui]]
[channel_mapping.communication_types.webui.credentials]
signing_secret = "webui-secret"
[[channel_mapping.communication_types.webui.channels]]
channel_id = "ProductionDB"
project = "demo"
dblab_server = "prod1"
[channel_mapping.communication_types.webui.channels.dblab_params]
dbname = "app"
sslmode = "disable"
"#;

#[test]
fn full_config_loads_and_validates() {
    let config = load_and_validate_str(FULL).expect("full config should validate");
    assert_eq!(config.app.host, "0.0.0.0");
    assert_eq!(config.app.port, 2500);
    assert!(config.app.debug);
    assert_eq!(config.app.min_notify_duration, 30);
    assert_eq!(config.app.version, "v0.7.0");
    assert!(config.platform.history_enabled);
    assert_eq!(config.enterprise.quota.limit, 3);
    assert!(config.enterprise.audit.enabled);
    assert_eq!(config.enterprise.dblab.instance_limit, 2);
    assert_eq!(config.enterprise.estimator.sample_threshold, 40);
    assert_eq!(config.workspaces(TRANSPORT_SLACK).len(), 1);
    assert_eq!(
        config.workspaces(TRANSPORT_SLACK_SOCKET_MODE)[0]
            .credentials
            .app_level_token
            .as_deref(),
        Some("xapp-2")
    );
    let webui = &config.workspaces(TRANSPORT_WEBUI)[0].channels[0];
    assert_eq!(webui.dblab_params.dbname, "app");
    assert_eq!(config.channel_count(), 3);
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = r#"
[enterprise.quota]
limt = 5
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("unknown key error");
    assert_eq!(unknown.0, "limt");
    assert_eq!(unknown.1.as_deref(), Some("limit"));
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[app]
port = "not-a-number"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. }))
    );
}

#[test]
fn channel_without_dblab_server_is_missing_key() {
    let toml = r#"
[[channel_mapping.communication_types.slack]]
[[channel_mapping.communication_types.slack.channels]]
channel_id = "C01"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("dblab_server"))
    ));
}

#[test]
fn legacy_transport_still_parses() {
    // Rejection of unsupported transports happens when assistants are assembled.
    let toml = r#"
[[channel_mapping.communication_types.slackrtm]]
[[channel_mapping.communication_types.slackrtm.channels]]
channel_id = "C01"
dblab_server = "prod1"
"#;
    let config = load_config_from_str(toml).unwrap();
    assert_eq!(config.workspaces("slackrtm").len(), 1);
}

#[test]
fn explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("joe.toml");
    std::fs::write(&path, FULL).unwrap();
    let config = load_and_validate(Some(&path)).expect("file config should validate");
    assert_eq!(config.app.port, 2500);
}
