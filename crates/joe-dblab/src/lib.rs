// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database Lab collaborator for the Joe assistant.
//!
//! [`HttpDblabClient`] implements [`joe_core::DblabClient`] over the Database Lab
//! REST API (`/clone`, `/clone/{id}`, `/clone/{id}/reset`).

pub mod client;
pub mod types;

pub use client::HttpDblabClient;
