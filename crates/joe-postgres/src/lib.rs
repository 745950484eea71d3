// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Postgres access to clones.
//!
//! [`PgConnectionFactory`] opens a single-backend sqlx pool per clone, and
//! [`PsqlProcessRunner`] shells out to `psql` for meta commands.

pub mod connection;
pub mod psql;

pub use connection::{PgConnectionFactory, PgSqlConnection};
pub use psql::PsqlProcessRunner;
