// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL access to a clone.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::JoeError;
use crate::types::{ConnectionParams, QueryRows};

/// A pooled connection to one clone.
///
/// Session state (`SET`, extension state such as hypothetical indexes) must persist
/// between calls, so implementations pin a single backend.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Runs a query with text parameters bound as `$1..$n`; values come back as text.
    async fn query(&self, sql: &str, params: &[&str]) -> Result<QueryRows, JoeError>;

    /// Runs a statement without collecting rows and returns the affected row count.
    async fn execute(&self, sql: &str) -> Result<u64, JoeError>;

    /// `server_version_num`, e.g. `150004`.
    async fn server_version_num(&self) -> Result<u32, JoeError>;

    async fn close(&self);
}

/// Opens connections to clones.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, params: &ConnectionParams)
    -> Result<Arc<dyn SqlConnection>, JoeError>;
}
