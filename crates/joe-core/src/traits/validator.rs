// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::JoeError;
use crate::types::IncomingMessage;

/// Transport-specific acceptance rules for inbound messages.
pub trait Validator: Send + Sync {
    /// Returns [`JoeError::Validation`] when the message must be dropped.
    fn validate(&self, msg: &IncomingMessage) -> Result<(), JoeError>;
}

/// Checks shared by every transport: a user and a channel must be present.
pub fn require_user_and_channel(msg: &IncomingMessage) -> Result<(), JoeError> {
    if msg.user_id.is_empty() {
        return Err(JoeError::Validation("user id is empty".into()));
    }
    if msg.channel_id.is_empty() {
        return Err(JoeError::Validation("channel id is empty".into()));
    }
    Ok(())
}
