// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command handlers.
//!
//! Every handler appends its output to the already published command
//! message, keeps the [`CommandRecord`] in sync for platform history, and
//! checks the cancellation token after each collaborator call.

pub mod activity;
pub mod exec;
pub mod explain;
pub mod help;
pub mod hypo;
pub mod meta;
pub mod plan;
pub mod terminate;

use std::sync::Arc;

use async_trait::async_trait;
use joe_core::text::{CUT_SEPARATOR, PLAN_SIZE, cut_text};
use joe_core::types::{CommandRecord, ConnectionParams, Message, QueryRows};
use joe_core::{ConnectionFactory, JoeError, Messenger, PlanAnalyzer, PsqlRunner, SqlConnection};
use tokio_util::sync::CancellationToken;

use crate::estimator::Estimator;

pub use activity::ActivityCommand;
pub use exec::ExecCommand;
pub use explain::ExplainCommand;
pub use hypo::HypoCommand;
pub use meta::MetaCommand;
pub use plan::PlanCommand;
pub use terminate::TerminateCommand;

/// Everything a handler may touch while running one command.
pub struct CommandContext<'a> {
    pub messenger: &'a dyn Messenger,
    pub connection: Arc<dyn SqlConnection>,
    pub params: &'a ConnectionParams,
    pub connections: &'a dyn ConnectionFactory,
    pub analyzer: &'a dyn PlanAnalyzer,
    pub psql: &'a dyn PsqlRunner,
    pub estimator: Option<&'a Estimator>,
    pub cancel: &'a CancellationToken,
}

impl CommandContext<'_> {
    /// Fails with [`JoeError::Cancelled`] once shutdown has begun.
    pub fn ensure_live(&self) -> Result<(), JoeError> {
        if self.cancel.is_cancelled() {
            return Err(JoeError::Cancelled);
        }
        Ok(())
    }

    /// Replaces the visible message text after new output was appended.
    pub async fn refresh(&self, msg: &Message) -> Result<(), JoeError> {
        self.ensure_live()?;
        self.messenger.update_text(msg).await?;
        self.ensure_live()
    }

    /// Uploads an artifact and returns its permalink.
    pub async fn upload(&self, msg: &Message, title: &str, content: &str) -> Result<String, JoeError> {
        self.ensure_live()?;
        let link = self.messenger.add_artifact(msg, title, content).await?;
        self.ensure_live()?;
        Ok(link)
    }

    /// Appends a titled plan preview and uploads the full plan as `artifact`.
    pub async fn append_plan(
        &self,
        msg: &mut Message,
        title: &str,
        artifact: &str,
        plan: &str,
    ) -> Result<(), JoeError> {
        let (preview, _) = cut_text(plan, PLAN_SIZE, CUT_SEPARATOR);
        let link = self.upload(msg, artifact, plan).await?;
        msg.append_text(&format!("{title}\n```{preview}```"));
        append_link(msg, &link);
        Ok(())
    }

    /// Appends fenced output, offloading the full body when the preview is cut.
    pub async fn append_output(
        &self,
        msg: &mut Message,
        artifact: &str,
        output: &str,
    ) -> Result<(), JoeError> {
        let (preview, truncated) = cut_text(output, PLAN_SIZE, CUT_SEPARATOR);
        msg.append_text(&format!("```{preview}```"));
        if truncated {
            let link = self.upload(msg, artifact, output).await?;
            append_link(msg, &link);
        }
        Ok(())
    }
}

fn append_link(msg: &mut Message, link: &str) {
    if !link.is_empty() {
        msg.append_text(&format!("<{link}|Show full output>"));
    }
}

/// A command implementation selected by the dispatcher or an edition pack.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError>;
}

/// Runs `EXPLAIN` output queries and joins the `QUERY PLAN` rows.
pub(crate) async fn explain_text(conn: &dyn SqlConnection, sql: &str) -> Result<String, JoeError> {
    let rows = conn.query(sql, &[]).await?;
    Ok(rows.first_column().join("\n"))
}

/// Renders rows as a psql-style aligned table.
pub fn format_table(rows: &QueryRows) -> String {
    let cells: Vec<Vec<&str>> = rows
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.as_deref().unwrap_or("")).collect())
        .collect();

    let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let line = |values: &[&str]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!(" {v:<width$} ", width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("|")
            .trim_end()
            .to_string()
    };

    let header: Vec<&str> = rows.columns.iter().map(String::as_str).collect();
    let mut out = Vec::with_capacity(cells.len() + 3);
    out.push(line(&header));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+"),
    );
    for row in &cells {
        out.push(line(row));
    }
    let count = cells.len();
    out.push(format!("({count} {})", if count == 1 { "row" } else { "rows" }));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_aligned() {
        let rows = QueryRows {
            columns: vec!["indexrelid".into(), "indexname".into()],
            rows: vec![vec![Some("13543".into()), Some("<13543>btree_t_a".into())]],
        };
        assert_eq!(
            format_table(&rows),
            " indexrelid | indexname\n------------+------------------\n 13543      | <13543>btree_t_a\n(1 row)"
        );
    }

    #[test]
    fn nulls_render_empty() {
        let rows = QueryRows {
            columns: vec!["a".into()],
            rows: vec![vec![None], vec![Some("x".into())]],
        };
        assert_eq!(format_table(&rows), " a\n---\n\n x\n(2 rows)");
    }
}
