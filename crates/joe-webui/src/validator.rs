// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use joe_core::traits::validator::require_user_and_channel;
use joe_core::types::{IncomingMessage, UserInfo};
use joe_core::{JoeError, UserInformer, Validator};

/// Web UI commands must name the platform session and command they answer.
#[derive(Debug, Default)]
pub struct WebUiValidator;

impl Validator for WebUiValidator {
    fn validate(&self, msg: &IncomingMessage) -> Result<(), JoeError> {
        require_user_and_channel(msg)?;
        if msg.session_id.as_deref().is_none_or(str::is_empty) {
            return Err(JoeError::Validation("session id is empty".into()));
        }
        if msg.command_id.as_deref().is_none_or(str::is_empty) {
            return Err(JoeError::Validation("command id is empty".into()));
        }
        Ok(())
    }
}

/// The platform only sends user ids.
#[derive(Debug, Default)]
pub struct PlatformUserInformer;

#[async_trait]
impl UserInformer for PlatformUserInformer {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo, JoeError> {
        Ok(UserInfo::from_id(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> IncomingMessage {
        IncomingMessage {
            text: "help".into(),
            user_id: "U1".into(),
            channel_id: "ProductionDB".into(),
            direct: true,
            session_id: Some("S1".into()),
            command_id: Some("K1".into()),
            ..IncomingMessage::default()
        }
    }

    #[test]
    fn complete_command_passes() {
        assert!(WebUiValidator.validate(&command()).is_ok());
    }

    #[test]
    fn missing_ids_are_rejected() {
        let mut msg = command();
        msg.session_id = None;
        assert!(matches!(
            WebUiValidator.validate(&msg),
            Err(JoeError::Validation(_))
        ));

        let mut msg = command();
        msg.command_id = Some(String::new());
        assert!(WebUiValidator.validate(&msg).is_err());

        let mut msg = command();
        msg.user_id.clear();
        assert!(WebUiValidator.validate(&msg).is_err());
    }

    #[tokio::test]
    async fn informer_uses_the_id() {
        let info = PlatformUserInformer.user_info("U7").await.unwrap();
        assert_eq!(info.display_name, "U7");
    }
}
