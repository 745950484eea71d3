// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processing engine of the Joe assistant.
//!
//! A transport turns chat events into [`IncomingMessage`]s and hands them to
//! the [`ProcessingService`] of their channel, which:
//! - Resolves the user and their clone session
//! - Parses and dispatches the command to its handler
//! - Renders results back through the transport's messenger
//! - Records the exchange in platform history
//!
//! The idle reaper, session persistence and signal handling live beside it.
//!
//! [`IncomingMessage`]: joe_core::types::IncomingMessage

pub mod analyzer;
pub mod assistant;
pub mod clone;
pub mod commands;
pub mod edition;
pub mod estimator;
pub mod parser;
pub mod pipeline;
pub mod quota;
pub mod reaper;
pub mod session;
pub mod shutdown;
pub mod store;
pub mod users;

pub use analyzer::BasicPlanAnalyzer;
pub use assistant::{Assistant, ProcessorRegistry, RestoreSummary};
pub use clone::{CloneDirectory, CloneManager, RestoreOutcome};
pub use edition::EditionPack;
pub use estimator::Estimator;
pub use pipeline::{EngineDeps, ProcessingService, ServiceConfig, ServiceDeps, SharedState};
pub use quota::Quota;
pub use reaper::{DEFAULT_REAPER_INTERVAL, StoppedSession, run_reaper};
pub use session::{Session, SessionState};
pub use shutdown::{drain_tasks, install_signal_handler};
pub use store::SessionStore;
pub use users::{User, UserRegistry};
