// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Joe assistant.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across collaborator traits and the processing pipeline.
#[derive(Debug, Error)]
pub enum JoeError {
    /// Fatal configuration errors (missing credentials, no processors configured).
    #[error("configuration error: {0}")]
    Config(String),

    /// A malformed inbound message. Dropped with a log line.
    #[error("invalid message: {0}")]
    Validation(String),

    /// A command was invoked with arguments it cannot accept.
    #[error("{0}")]
    Usage(String),

    /// Per-user rate limit reached.
    #[error(
        "You have reached the limit of requests per {interval_secs} seconds ({limit}). Please wait before trying again"
    )]
    QuotaExceeded { limit: u32, interval_secs: u64 },

    /// Clone acquisition, connection open or reset failures.
    #[error("{message}")]
    Session {
        message: String,
        source: Option<BoxedSource>,
    },

    /// SQL failure reported by the clone, with the SQLSTATE when known.
    #[error("{message}")]
    Query {
        message: String,
        code: Option<String>,
    },

    /// The clone could not be reached (network, IO, closed pool).
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<BoxedSource>,
    },

    /// A collaborator service (platform, database lab, chat API) failed.
    #[error("{service} error: {message}")]
    Integration { service: String, message: String },

    /// The root cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// SQLSTATE returned by Postgres when an extension library is missing.
pub const SQLSTATE_UNDEFINED_FILE: &str = "58P01";

impl JoeError {
    /// Builds a session error without an underlying source.
    pub fn session(message: impl Into<String>) -> Self {
        JoeError::Session {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an integration error for the named service.
    pub fn integration(service: impl Into<String>, message: impl Into<String>) -> Self {
        JoeError::Integration {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        JoeError::Usage(message.into())
    }

    /// Builds a connection error without an underlying source.
    pub fn connection(message: impl Into<String>) -> Self {
        JoeError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the SQLSTATE of a query error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            JoeError::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the error means the clone may be gone.
    ///
    /// Connection errors always qualify. Query errors qualify when their SQLSTATE is
    /// in class `08` (connection exception) or is one of the operator-intervention
    /// codes raised while a server shuts down.
    pub fn is_connection_error(&self) -> bool {
        match self {
            JoeError::Connection { .. } => true,
            JoeError::Query {
                code: Some(code), ..
            } => code.starts_with("08") || matches!(code.as_str(), "57P01" | "57P02" | "57P03"),
            _ => false,
        }
    }

    /// Whether the error is a missing-extension failure (`undefined_file`).
    pub fn is_undefined_file(&self) -> bool {
        self.sqlstate() == Some(SQLSTATE_UNDEFINED_FILE)
    }
}
