// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs psql meta commands as a child process.
//!
//! Connection parameters travel through `PG*` environment variables, never
//! the command line.

use async_trait::async_trait;
use joe_core::types::ConnectionParams;
use joe_core::{JoeError, PsqlRunner};
use tracing::debug;

/// Executes `psql --no-psqlrc --command <cmd>` against a clone.
#[derive(Debug, Clone)]
pub struct PsqlProcessRunner {
    program: String,
}

impl Default for PsqlProcessRunner {
    fn default() -> Self {
        Self {
            program: "psql".to_string(),
        }
    }
}

impl PsqlProcessRunner {
    /// Uses a specific psql binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl PsqlRunner for PsqlProcessRunner {
    async fn run(&self, params: &ConnectionParams, command: &str) -> Result<String, JoeError> {
        debug!(program = %self.program, command, "running psql meta command");

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("--no-psqlrc").arg("--command").arg(command);
        for (var, value) in [
            ("PGHOST", &params.host),
            ("PGPORT", &params.port),
            ("PGUSER", &params.user),
            ("PGPASSWORD", &params.password),
            ("PGDATABASE", &params.dbname),
            ("PGSSLMODE", &params.ssl_mode),
        ] {
            if !value.is_empty() {
                cmd.env(var, value);
            }
        }

        let output = cmd
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| JoeError::Internal(format!("failed to execute {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let message = if stderr.trim().is_empty() {
                format!("psql exited with code {exit_code}")
            } else {
                stderr.trim().to_string()
            };
            return Err(JoeError::Query {
                message,
                code: None,
            });
        }

        Ok(stdout.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_command_as_argument() {
        let runner = PsqlProcessRunner::with_program("echo");
        let out = runner
            .run(&ConnectionParams::default(), "\\d+ users")
            .await
            .unwrap();
        assert_eq!(out, "--no-psqlrc --command \\d+ users");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_query_error() {
        let runner = PsqlProcessRunner::with_program("false");
        let err = runner
            .run(&ConnectionParams::default(), "\\l")
            .await
            .unwrap_err();
        assert!(matches!(err, JoeError::Query { .. }));
        assert!(err.to_string().contains("exited with code 1"));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let runner = PsqlProcessRunner::with_program("joe-no-such-psql-binary");
        assert!(runner.run(&ConnectionParams::default(), "\\l").await.is_err());
    }
}
