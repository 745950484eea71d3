// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack transports for the Joe assistant.
//!
//! `slack` receives events over the signed HTTP callback, `slacksm` over a
//! socket mode websocket. Both post through the Slack Web API and share the
//! same validator and status reactions.

pub mod api;
pub mod assistant;
pub mod events;
pub mod messenger;
pub mod server;
pub mod signature;
pub mod socket;

pub use api::SlackApi;
pub use assistant::{SlackAssistant, SlackMode};
pub use events::{EventPayload, SlackEvent, SlackValidator};
pub use messenger::SlackMessenger;
pub use server::events_router;
