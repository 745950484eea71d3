// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Joe integration tests.
//!
//! Mock collaborators and a harness for fast, deterministic tests without a
//! Database Lab, a platform or a chat workspace.
//!
//! # Components
//!
//! - [`MockMessenger`] - captures published messages, statuses and artifacts
//! - [`MockDblab`] - in-memory clones with controllable status
//! - [`MockConnectionFactory`] - scripted SQL connections
//! - [`TestHarness`] - a processor registry wired to all of the above

pub mod harness;
pub mod mock_dblab;
pub mod mock_informer;
pub mod mock_messenger;
pub mod mock_platform;
pub mod mock_postgres;

pub use harness::TestHarness;
pub use mock_dblab::MockDblab;
pub use mock_informer::{BasicValidator, StaticInformer};
pub use mock_messenger::{MockMessenger, UploadedArtifact};
pub use mock_platform::MockPlatform;
pub use mock_postgres::{MockConnection, MockConnectionFactory, MockPsql, column};
