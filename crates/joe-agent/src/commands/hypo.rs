// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hypo`: hypothetical indexes through the hypopg extension.

use async_trait::async_trait;
use joe_core::types::{CommandRecord, Message};
use joe_core::{JoeError, SqlConnection};

use super::{CommandContext, CommandHandler, format_table};

pub const SUB_CREATE: &str = "create";
pub const SUB_DESC: &str = "desc";
pub const SUB_DROP: &str = "drop";
pub const SUB_RESET: &str = "reset";

const CREATE_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS hypopg";

pub const HYPOPG_MISSING_HINT: &str = "The hypopg extension is not available on this Database Lab instance. \
     Use a Postgres image that ships hypopg or install the extension into the current one.";

#[derive(Debug, Default)]
pub struct HypoCommand;

async fn init_extension(conn: &dyn SqlConnection) -> Result<(), JoeError> {
    match conn.execute(CREATE_EXTENSION).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_undefined_file() => Err(JoeError::usage(format!("{HYPOPG_MISSING_HINT}\n{e}"))),
        Err(e) => Err(e),
    }
}

fn split_sub(query: &str) -> (String, &str) {
    let query = query.trim();
    match query.find(char::is_whitespace) {
        Some(idx) => (query[..idx].to_lowercase(), query[idx..].trim_start()),
        None => (query.to_lowercase(), ""),
    }
}

#[async_trait]
impl CommandHandler for HypoCommand {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        let (sub, args) = split_sub(&record.query);
        let conn = ctx.connection.as_ref();

        let output = match sub.as_str() {
            SUB_CREATE => {
                if args.is_empty() {
                    return Err(JoeError::usage("index definition is required, e.g. `hypo create index on t (a)`"));
                }
                init_extension(conn).await?;
                ctx.ensure_live()?;
                let definition = if args.to_lowercase().starts_with("create ") {
                    args.to_string()
                } else {
                    format!("create {args}")
                };
                let rows = conn
                    .query(
                        "select indexrelid::text as indexrelid, indexname::text as indexname from hypopg_create_index($1)",
                        &[&definition],
                    )
                    .await?;
                format!("```{}```", format_table(&rows))
            }
            SUB_DESC => {
                init_extension(conn).await?;
                ctx.ensure_live()?;
                let base = "select h.indexrelid::text as id, hypopg_get_indexdef(h.indexrelid) as definition, \
                     pg_size_pretty(hypopg_relation_size(h.indexrelid)) as estimated_size \
                     from hypopg_list_indexes() h";
                let rows = if args.is_empty() {
                    conn.query(base, &[]).await?
                } else {
                    conn.query(&format!("{base} where h.indexrelid = $1::oid"), &[args])
                        .await?
                };
                format!("```{}```", format_table(&rows))
            }
            SUB_DROP => {
                if args.is_empty() {
                    return Err(JoeError::usage("index id is required"));
                }
                init_extension(conn).await?;
                ctx.ensure_live()?;
                conn.query("select hypopg_drop_index($1::oid)::text", &[args])
                    .await?;
                format!("Hypothetical index {args} has been dropped")
            }
            SUB_RESET => {
                init_extension(conn).await?;
                ctx.ensure_live()?;
                conn.query("select hypopg_reset()::text", &[]).await?;
                "All hypothetical indexes have been deleted.".to_string()
            }
            other => {
                return Err(JoeError::usage(format!(
                    "unknown hypo sub-command `{other}`, use one of: {SUB_CREATE}, {SUB_DESC}, {SUB_DROP}, {SUB_RESET}"
                )));
            }
        };
        ctx.ensure_live()?;

        msg.append_text(&output);
        record.response = output;
        ctx.refresh(msg).await
    }
}
