// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator interfaces the engine is written against.
//!
//! Async collaborators use `#[async_trait]` so they can be held as `Arc<dyn _>`.

pub mod analyzer;
pub mod dblab;
pub mod informer;
pub mod messenger;
pub mod platform;
pub mod psql;
pub mod sql;
pub mod validator;

pub use analyzer::PlanAnalyzer;
pub use dblab::DblabClient;
pub use informer::UserInformer;
pub use messenger::Messenger;
pub use platform::PlatformClient;
pub use psql::PsqlRunner;
pub use sql::{ConnectionFactory, SqlConnection};
pub use validator::Validator;
