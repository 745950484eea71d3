// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use joe_core::JoeError;
use joe_core::text::ellipsize;
use joe_core::types::{CommandRecord, Message, QueryRows};

use super::{CommandContext, CommandHandler, format_table};

pub const QUERY_PREVIEW_LEN: usize = 100;
pub const NO_ACTIVE_QUERIES: &str = "No active queries";

const ACTIVITY_SQL: &str = "select pid::text as pid, \
        coalesce(usename, '')::text as user, \
        coalesce(state, '')::text as state, \
        coalesce(wait_event_type || ': ' || wait_event, '')::text as wait_event, \
        coalesce(query_start::text, '') as query_start, \
        coalesce(query, '') as query \
     from pg_stat_activity \
     where state in ('active', 'idle in transaction', 'disabled') \
       and pid <> pg_backend_pid() \
     order by query_start";

/// `activity`: running backends on the clone, minus this connection.
#[derive(Debug, Default)]
pub struct ActivityCommand;

fn truncate_queries(mut rows: QueryRows) -> QueryRows {
    let Some(idx) = rows.columns.iter().position(|c| c == "query") else {
        return rows;
    };
    for row in &mut rows.rows {
        if let Some(Some(query)) = row.get_mut(idx) {
            *query = ellipsize(&query.replace('\n', " "), QUERY_PREVIEW_LEN);
        }
    }
    rows
}

#[async_trait]
impl CommandHandler for ActivityCommand {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        let rows = ctx.connection.query(ACTIVITY_SQL, &[]).await?;
        ctx.ensure_live()?;

        let output = if rows.is_empty() {
            NO_ACTIVE_QUERIES.to_string()
        } else {
            format!("```{}```", format_table(&truncate_queries(rows)))
        };
        msg.append_text(&output);
        record.response = output;
        ctx.refresh(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_queries_are_cut() {
        let rows = QueryRows {
            columns: vec!["pid".into(), "query".into()],
            rows: vec![vec![Some("1".into()), Some("x".repeat(150))]],
        };
        let out = truncate_queries(rows);
        let query = out.rows[0][1].as_deref().unwrap();
        assert_eq!(query.chars().count(), QUERY_PREVIEW_LEN + 3);
        assert!(query.ends_with("..."));
    }

    #[test]
    fn excludes_own_backend() {
        assert!(ACTIVITY_SQL.contains("pid <> pg_backend_pid()"));
    }
}
