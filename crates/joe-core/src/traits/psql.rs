// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::JoeError;
use crate::types::ConnectionParams;

/// Runs a single psql meta command against a clone and returns its output.
#[async_trait]
pub trait PsqlRunner: Send + Sync {
    async fn run(&self, params: &ConnectionParams, command: &str) -> Result<String, JoeError>;
}
