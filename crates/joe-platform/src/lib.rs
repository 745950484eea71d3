// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform collaborator: RPC client persisting sessions, commands, messages and
//! artifacts into the web platform history.

pub mod client;

pub use client::HttpPlatformClient;
