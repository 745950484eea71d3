// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/joe/joe.toml` < `~/.config/joe/joe.toml` < `./joe.toml`
//! < explicit `--config` file < `JOE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::JoeConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/joe/joe.toml";

/// Configuration file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "joe.toml";

/// Per-user configuration file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("joe").join("joe.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<JoeConfig, figment::Error> {
    build_figment(None).extract()
}

/// Load configuration with an explicit file layered above the standard hierarchy.
pub fn load_config_from_path(path: &Path) -> Result<JoeConfig, figment::Error> {
    build_figment(Some(path)).extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<JoeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(JoeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(JoeConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH));

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment.merge(env_provider())
}

/// Section prefixes, longest first, mapped to their dotted form.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("enterprise_quota_", "enterprise.quota."),
    ("enterprise_audit_", "enterprise.audit."),
    ("enterprise_dblab_", "enterprise.dblab."),
    ("enterprise_estimator_", "enterprise.estimator."),
    ("platform_", "platform."),
    ("app_", "app."),
];

/// Maps a lowercased, prefix-stripped variable name to its config key.
///
/// Uses an explicit table rather than splitting on `_`, since keys such as
/// `history_enabled` contain underscores.
pub fn map_env_key(key: &str) -> String {
    for (prefix, dotted) in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{dotted}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("JOE_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("app_port"), "app.port");
        assert_eq!(map_env_key("platform_history_enabled"), "platform.history_enabled");
        assert_eq!(
            map_env_key("enterprise_quota_limit"),
            "enterprise.quota.limit"
        );
        assert_eq!(
            map_env_key("enterprise_dblab_instance_limit"),
            "enterprise.dblab.instance_limit"
        );
        assert_eq!(
            map_env_key("enterprise_estimator_read_ratio"),
            "enterprise.estimator.read_ratio"
        );
    }

    #[test]
    fn env_overrides_files() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[app]
port = 3000

[enterprise.quota]
limit = 5
"#,
            )?;
            jail.set_env("JOE_APP_PORT", "4000");
            jail.set_env("JOE_PLATFORM_HISTORY_ENABLED", "true");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.app.port, 4000);
            assert_eq!(config.enterprise.quota.limit, 5);
            assert!(config.platform.history_enabled);
            Ok(())
        });
    }

    #[test]
    fn local_file_is_picked_up() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(LOCAL_CONFIG_PATH, "[app]\ndebug = true\n")?;
            let config = load_config()?;
            assert!(config.app.debug);
            Ok(())
        });
    }
}
