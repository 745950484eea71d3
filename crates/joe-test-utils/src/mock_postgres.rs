// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted clone connections and psql runner.
//!
//! Every connection opened through one [`MockConnectionFactory`] shares its
//! script and statement log. Rules match when the statement contains their
//! pattern; the most recently added matching rule wins.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use joe_core::types::{ConnectionParams, QueryRows};
use joe_core::{ConnectionFactory, JoeError, PsqlRunner, SqlConnection};

pub const DEFAULT_SERVER_VERSION: u32 = 150_004;

pub const SAMPLE_TEXT_PLAN: &str = "Result  (cost=0.00..0.01 rows=1 width=4)";

pub const SAMPLE_JSON_PLAN: &str = r#"[{"Plan": {"Node Type": "Result", "Startup Cost": 0.0, "Total Cost": 0.01, "Plan Rows": 1, "Plan Width": 4, "Actual Startup Time": 0.002, "Actual Total Time": 0.003, "Actual Rows": 1, "Actual Loops": 1, "Shared Hit Blocks": 0, "Shared Read Blocks": 0, "Shared Dirtied Blocks": 0, "Shared Written Blocks": 0}, "Planning Time": 0.025, "Execution Time": 0.012}]"#;

#[derive(Debug, Clone)]
enum Reply {
    Rows(QueryRows),
    Query { message: String, code: Option<String> },
    Connection(String),
}

impl Reply {
    fn into_result(self) -> Result<QueryRows, JoeError> {
        match self {
            Reply::Rows(rows) => Ok(rows),
            Reply::Query { message, code } => Err(JoeError::Query { message, code }),
            Reply::Connection(message) => Err(JoeError::connection(message)),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    reply: Reply,
    once: bool,
}

#[derive(Default)]
struct Script {
    rules: Vec<Rule>,
    executed: Vec<String>,
}

impl Script {
    fn reply(&mut self, sql: &str) -> Option<Reply> {
        self.executed.push(sql.to_string());
        let index = self.rules.iter().rposition(|r| sql.contains(&r.pattern))?;
        let rule = if self.rules[index].once {
            self.rules.remove(index)
        } else {
            self.rules[index].clone()
        };
        Some(rule.reply)
    }
}

/// Builds a single-column result.
pub fn column(name: &str, values: &[&str]) -> QueryRows {
    QueryRows {
        columns: vec![name.to_string()],
        rows: values.iter().map(|v| vec![Some(v.to_string())]).collect(),
    }
}

pub struct MockConnection {
    script: Arc<Mutex<Script>>,
    version: u32,
    params: ConnectionParams,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn run(&self, sql: &str) -> Result<QueryRows, JoeError> {
        if self.is_closed() {
            return Err(JoeError::connection("connection is closed"));
        }
        let reply = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reply(sql);
        reply.map_or_else(|| Ok(QueryRows::default()), Reply::into_result)
    }
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn query(&self, sql: &str, _params: &[&str]) -> Result<QueryRows, JoeError> {
        self.run(sql)
    }

    async fn execute(&self, sql: &str) -> Result<u64, JoeError> {
        self.run(sql).map(|rows| rows.rows.len() as u64)
    }

    async fn server_version_num(&self) -> Result<u32, JoeError> {
        Ok(self.version)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct MockConnectionFactory {
    script: Arc<Mutex<Script>>,
    version: u32,
    fail_connect: AtomicBool,
    opened: AtomicU32,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl Default for MockConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnectionFactory {
    /// A factory answering `EXPLAIN` statements with a trivial plan.
    pub fn new() -> Self {
        let factory = Self {
            script: Arc::new(Mutex::new(Script::default())),
            version: DEFAULT_SERVER_VERSION,
            fail_connect: AtomicBool::new(false),
            opened: AtomicU32::new(0),
            connections: Mutex::new(Vec::new()),
        };
        factory.respond("EXPLAIN (FORMAT TEXT)", column("QUERY PLAN", &[SAMPLE_TEXT_PLAN]));
        factory.respond("EXPLAIN (ANALYZE", column("QUERY PLAN", &[SAMPLE_JSON_PLAN]));
        factory.respond("pg_backend_pid()", column("pg_backend_pid", &["4242"]));
        factory
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, pattern: &str, reply: Reply, once: bool) {
        self.script().rules.push(Rule {
            pattern: pattern.to_string(),
            reply,
            once,
        });
    }

    /// Answers statements containing `pattern` with `rows`.
    pub fn respond(&self, pattern: &str, rows: QueryRows) {
        self.push(pattern, Reply::Rows(rows), false);
    }

    /// Fails statements containing `pattern` with a SQL error.
    pub fn fail_query(&self, pattern: &str, message: &str, code: Option<&str>) {
        let reply = Reply::Query {
            message: message.to_string(),
            code: code.map(str::to_string),
        };
        self.push(pattern, reply, false);
    }

    /// Fails statements containing `pattern` as if the clone went away.
    pub fn fail_connection(&self, pattern: &str) {
        self.push(pattern, Reply::Connection("broken pipe".to_string()), false);
    }

    /// Like [`fail_connection`](Self::fail_connection), for the next match only.
    pub fn fail_connection_once(&self, pattern: &str) {
        self.push(pattern, Reply::Connection("broken pipe".to_string()), true);
    }

    /// Makes `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Every statement run on any connection, in order.
    pub fn executed(&self) -> Vec<String> {
        self.script().executed.clone()
    }

    /// Statements containing `needle`.
    pub fn executed_matching(&self, needle: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| sql.contains(needle))
            .collect()
    }

    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Arc<dyn SqlConnection>, JoeError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(JoeError::connection(format!(
                "cannot connect to {}:{}",
                params.host, params.port
            )));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(MockConnection {
            script: Arc::clone(&self.script),
            version: self.version,
            params: params.clone(),
            closed: AtomicBool::new(false),
        });
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&connection));
        Ok(connection)
    }
}

/// psql runner returning a fixed listing.
pub struct MockPsql {
    output: String,
    commands: Mutex<Vec<String>>,
}

impl Default for MockPsql {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPsql {
    pub fn new() -> Self {
        Self::with_output("        List of relations\n Schema | Name  | Type  | Owner\n--------+-------+-------+-------\n public | users | table | joe\n(1 row)")
    }

    pub fn with_output(output: &str) -> Self {
        Self {
            output: output.to_string(),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Meta commands received, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PsqlRunner for MockPsql {
    async fn run(&self, _params: &ConnectionParams, command: &str) -> Result<String, JoeError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());
        Ok(self.output.clone())
    }
}
