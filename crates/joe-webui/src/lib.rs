// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web UI transport for the Joe assistant.
//!
//! The platform console posts signed commands to `/webui/commands`; replies,
//! statuses and artifacts are written back through the platform API.

pub mod assistant;
pub mod messenger;
pub mod server;
pub mod signature;
pub mod validator;

pub use assistant::WebUiAssistant;
pub use messenger::PlatformMessenger;
pub use server::{ChannelEntry, CommandRequest, channels_router, command_router, webui_channels};
pub use validator::{PlatformUserInformer, WebUiValidator};
