// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! sqlx-backed clone connections.
//!
//! Each clone gets a pool capped at one connection with no idle or lifetime
//! expiry, so `SET` and extension state stay on the same backend between
//! commands.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use joe_core::types::{ConnectionParams, QueryRows};
use joe_core::{ConnectionFactory, JoeError, SqlConnection};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

/// Opens single-backend pools to clones.
#[derive(Debug, Clone)]
pub struct PgConnectionFactory {
    acquire_timeout: Duration,
}

impl Default for PgConnectionFactory {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PgConnectionFactory {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self { acquire_timeout }
    }
}

/// Builds sqlx connect options from clone parameters.
pub fn connect_options(params: &ConnectionParams) -> Result<PgConnectOptions, JoeError> {
    let port: u16 = params
        .port
        .parse()
        .map_err(|_| JoeError::session(format!("invalid clone port `{}`", params.port)))?;
    let ssl_mode = if params.ssl_mode.is_empty() {
        PgSslMode::Prefer
    } else {
        PgSslMode::from_str(&params.ssl_mode)
            .map_err(|e| JoeError::session(format!("invalid sslmode `{}`: {e}", params.ssl_mode)))?
    };

    Ok(PgConnectOptions::new()
        .host(&params.host)
        .port(port)
        .username(&params.user)
        .password(&params.password)
        .database(&params.dbname)
        .ssl_mode(ssl_mode)
        .application_name("joe"))
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Arc<dyn SqlConnection>, JoeError> {
        let options = connect_options(params)?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| JoeError::Session {
                message: format!("failed to connect to clone: {}", describe(&e)),
                source: Some(Box::new(e)),
            })?;

        info!(host = %params.host, port = %params.port, dbname = %params.dbname, "connected to clone");
        Ok(Arc::new(PgSqlConnection { pool }))
    }
}

/// A clone connection over a one-connection pool.
#[derive(Debug, Clone)]
pub struct PgSqlConnection {
    pool: PgPool,
}

impl PgSqlConnection {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlConnection for PgSqlConnection {
    async fn query(&self, sql: &str, params: &[&str]) -> Result<QueryRows, JoeError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_error)?;
        debug!(rows = rows.len(), "query finished");
        rows_to_text(&rows)
    }

    async fn execute(&self, sql: &str) -> Result<u64, JoeError> {
        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;
        Ok(result.rows_affected())
    }

    async fn server_version_num(&self) -> Result<u32, JoeError> {
        let rows = self
            .query("select current_setting('server_version_num')", &[])
            .await?;
        rows.scalar()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| JoeError::Internal("server_version_num is not a number".into()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn rows_to_text(rows: &[PgRow]) -> Result<QueryRows, JoeError> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| cell_text(row, i))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, JoeError>>()?;

    Ok(QueryRows { columns, rows })
}

/// Renders one cell as text. Queries returning other types should cast to `text`.
fn cell_text(row: &PgRow, index: usize) -> Result<Option<String>, JoeError> {
    let raw = row.try_get_raw(index).map_err(map_error)?;
    if raw.is_null() {
        return Ok(None);
    }

    let type_name = row.column(index).type_info().name().to_string();
    let text = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(|v| v.to_string()),
        "INT2" => row.try_get::<i16, _>(index).map(|v| v.to_string()),
        "INT4" => row.try_get::<i32, _>(index).map(|v| v.to_string()),
        "INT8" => row.try_get::<i64, _>(index).map(|v| v.to_string()),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| v.to_string()),
        "FLOAT8" => row.try_get::<f64, _>(index).map(|v| v.to_string()),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(index)
            .map(|v| v.0.to_string()),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(index)
            .map(|v| v.to_string()),
        _ => row.try_get::<String, _>(index),
    };

    text.map(Some).map_err(|e| {
        JoeError::Internal(format!(
            "cannot render column {index} of type {type_name} as text: {e}"
        ))
    })
}

/// Maps sqlx errors onto query and connection failures.
pub fn map_error(err: sqlx::Error) -> JoeError {
    match err {
        sqlx::Error::Database(db) => JoeError::Query {
            message: db.message().to_string(),
            code: db.code().map(|c| c.into_owned()),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => JoeError::Connection {
            message: describe(&err),
            source: Some(Box::new(err)),
        },
        other => JoeError::Query {
            message: other.to_string(),
            code: None,
        },
    }
}

fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}
