// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::JoeError;
use crate::types::UserInfo;

/// Resolves a transport user id into an identity snapshot.
#[async_trait]
pub trait UserInformer: Send + Sync {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo, JoeError>;
}
