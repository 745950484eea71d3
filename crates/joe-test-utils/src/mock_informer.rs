// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static user directory and a permissive validator.

use std::collections::HashMap;

use async_trait::async_trait;
use joe_core::traits::validator::require_user_and_channel;
use joe_core::types::{IncomingMessage, UserInfo};
use joe_core::{JoeError, UserInformer, Validator};

/// Resolves users from a fixed map, falling back to the bare id.
#[derive(Debug, Default)]
pub struct StaticInformer {
    users: HashMap<String, UserInfo>,
}

impl StaticInformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, display_name: &str, real_name: &str) -> Self {
        self.users.insert(
            id.to_string(),
            UserInfo {
                id: id.to_string(),
                display_name: display_name.to_string(),
                real_name: real_name.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl UserInformer for StaticInformer {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo, JoeError> {
        Ok(self
            .users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserInfo::from_id(user_id)))
    }
}

/// Accepts any message with a user and a channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicValidator;

impl Validator for BasicValidator {
    fn validate(&self, msg: &IncomingMessage) -> Result<(), JoeError> {
        require_user_and_channel(msg)
    }
}
