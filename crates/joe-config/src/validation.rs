// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! All errors are collected; validation does not stop at the first failure.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{JoeConfig, SSL_MODES};

/// Validates a deserialized configuration.
pub fn validate_config(config: &JoeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let quota = &config.enterprise.quota;
    if quota.limit < 1 {
        errors.push(ConfigError::validation(
            "enterprise.quota.limit must be at least 1",
        ));
    }
    if quota.interval < 1 {
        errors.push(ConfigError::validation(
            "enterprise.quota.interval must be at least 1 second",
        ));
    }

    let estimator = &config.enterprise.estimator;
    if estimator.read_ratio <= 0.0 {
        errors.push(ConfigError::validation(format!(
            "enterprise.estimator.read_ratio must be positive, got {}",
            estimator.read_ratio
        )));
    }
    if estimator.write_ratio <= 0.0 {
        errors.push(ConfigError::validation(format!(
            "enterprise.estimator.write_ratio must be positive, got {}",
            estimator.write_ratio
        )));
    }
    if estimator.profiling_interval < 1 {
        errors.push(ConfigError::validation(
            "enterprise.estimator.profiling_interval must be at least 1 ms",
        ));
    }
    if estimator.sample_threshold < 1 {
        errors.push(ConfigError::validation(
            "enterprise.estimator.sample_threshold must be at least 1",
        ));
    }

    if config.platform.history_enabled
        && config
            .platform
            .token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "platform.history_enabled requires platform.token",
        ));
    }

    if config.app.sessions_path.trim().is_empty() {
        errors.push(ConfigError::validation("app.sessions_path must not be empty"));
    }

    for (name, server) in &config.channel_mapping.dblab_servers {
        if server.url.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "channel_mapping.dblab_servers.{name}.url must not be empty"
            )));
        }
    }

    for (transport, workspaces) in &config.channel_mapping.communication_types {
        for (i, workspace) in workspaces.iter().enumerate() {
            let mut seen = HashSet::new();
            for channel in &workspace.channels {
                let at = format!("{transport}[{i}] channel `{}`", channel.channel_id);

                if channel.channel_id.trim().is_empty() {
                    errors.push(ConfigError::validation(format!(
                        "{transport}[{i}]: channel_id must not be empty"
                    )));
                }
                if !seen.insert(channel.channel_id.as_str()) {
                    errors.push(ConfigError::validation(format!(
                        "{at}: duplicate channel_id in workspace"
                    )));
                }
                if !config
                    .channel_mapping
                    .dblab_servers
                    .contains_key(&channel.dblab_server)
                {
                    errors.push(ConfigError::validation(format!(
                        "{at}: dblab_server `{}` is not defined in channel_mapping.dblab_servers",
                        channel.dblab_server
                    )));
                }
                if !SSL_MODES.contains(&channel.dblab_params.sslmode.as_str()) {
                    errors.push(ConfigError::validation(format!(
                        "{at}: sslmode `{}` must be one of {}",
                        channel.dblab_params.sslmode,
                        SSL_MODES.join(", ")
                    )));
                }
            }
        }
    }

    if config.channel_count() == 0 {
        errors.push(ConfigError::validation(
            "no processors configured: add at least one channel under channel_mapping.communication_types",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_config_from_str;

    const MINIMAL: &str = r#"
[channel_mapping.dblab_servers.prod1]
url = "https://dblab.example.com"
token = "t"

[[channel_mapping.communication_types.webui]]
[channel_mapping.communication_types.webui.credentials]
signing_secret = "s"
[[channel_mapping.communication_types.webui.channels]]
channel_id = "ProductionDB"
dblab_server = "prod1"
"#;

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn minimal_config_validates() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_mapping_has_no_processors() {
        let errors = validate_config(&JoeConfig::default()).unwrap_err();
        assert!(messages(&errors)
            .iter()
            .any(|m| m.contains("no processors configured")));
    }

    #[test]
    fn unknown_dblab_server_is_reported() {
        let toml = MINIMAL.replace("dblab_server = \"prod1\"", "dblab_server = \"prod2\"");
        let config = load_config_from_str(&toml).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors).iter().any(|m| m.contains("`prod2`")));
    }

    #[test]
    fn errors_are_collected() {
        let mut config = load_config_from_str(MINIMAL).unwrap();
        config.enterprise.quota.limit = 0;
        config.enterprise.estimator.read_ratio = 0.0;
        config.platform.history_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn bad_sslmode_is_reported() {
        let toml = format!(
            "{MINIMAL}[channel_mapping.communication_types.webui.channels.dblab_params]\nsslmode = \"maybe\"\n"
        );
        let config = load_config_from_str(&toml).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors).iter().any(|m| m.contains("sslmode `maybe`")));
    }

    #[test]
    fn duplicate_channel_is_reported() {
        let toml = format!(
            "{MINIMAL}[[channel_mapping.communication_types.webui.channels]]\nchannel_id = \"ProductionDB\"\ndblab_server = \"prod1\"\n"
        );
        let config = load_config_from_str(&toml).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors).iter().any(|m| m.contains("duplicate channel_id")));
    }
}
