// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database lab collaborator: provisions and tears down clones.

use async_trait::async_trait;

use crate::error::JoeError;
use crate::types::{CloneInfo, CreateCloneRequest};

#[async_trait]
pub trait DblabClient: Send + Sync {
    /// Creates a clone and waits until it is usable.
    async fn create_clone(&self, req: &CreateCloneRequest) -> Result<CloneInfo, JoeError>;

    async fn get_clone(&self, clone_id: &str) -> Result<CloneInfo, JoeError>;

    /// Resets the clone to its initial data state.
    async fn reset_clone(&self, clone_id: &str) -> Result<(), JoeError>;

    async fn destroy_clone(&self, clone_id: &str) -> Result<(), JoeError>;

    /// Base URL of the instance. Its host is used when a clone reports none.
    fn url(&self) -> &str;
}
