// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plan`: `EXPLAIN` without execution, with and without hypothetical indexes.

use async_trait::async_trait;
use joe_core::types::{CommandRecord, Message};
use joe_core::{JoeError, SqlConnection};
use tracing::debug;

use super::{CommandContext, CommandHandler, explain_text};

pub const ARTIFACT_PLAN: &str = "plan-wo-execution-text";
pub const ARTIFACT_PLAN_HYPO: &str = "plan-hypo-text";
pub const ARTIFACT_PLAN_WO_HYPO: &str = "plan-wo-hypo-text";

const HYPOPG_INSTALLED: &str =
    "select exists (select 1 from pg_extension where extname = 'hypopg')::text";
const HYPO_INDEX_IDS: &str = "select indexrelid::text from hypopg_list_indexes()";

#[derive(Debug, Default)]
pub struct PlanCommand;

pub(crate) fn explain_sql(query: &str) -> String {
    format!("EXPLAIN (FORMAT TEXT) {query}")
}

/// Ids of hypothetical indexes referenced by `plan`.
///
/// hypopg names its indexes `<oid>btree_...`, so a plan uses one when the
/// bracketed oid appears in the text.
async fn hypo_indexes_in_plan(conn: &dyn SqlConnection, plan: &str) -> Result<Vec<String>, JoeError> {
    let installed = conn.query(HYPOPG_INSTALLED, &[]).await?;
    if installed.scalar() != Some("true") {
        return Ok(Vec::new());
    }

    let ids = conn.query(HYPO_INDEX_IDS, &[]).await?.first_column();
    Ok(ids
        .into_iter()
        .filter(|id| plan.contains(&format!("<{id}>")))
        .collect())
}

#[async_trait]
impl CommandHandler for PlanCommand {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        if record.query.trim().is_empty() {
            return Err(JoeError::usage("query is required"));
        }

        let conn = ctx.connection.as_ref();
        let sql = explain_sql(&record.query);
        let plan = explain_text(conn, &sql).await?;
        ctx.ensure_live()?;
        record.plan_text = plan.clone();

        let used = hypo_indexes_in_plan(conn, &plan).await?;
        ctx.ensure_live()?;

        if used.is_empty() {
            ctx.append_plan(msg, "Plan without execution:", ARTIFACT_PLAN, &plan)
                .await?;
            record.response = plan;
            return ctx.refresh(msg).await;
        }

        debug!(indexes = ?used, "plan uses hypothetical indexes");
        ctx.append_plan(msg, "Plan with hypothetical indexes:", ARTIFACT_PLAN_HYPO, &plan)
            .await?;

        conn.execute("SET hypopg.enabled TO off").await?;
        let without = explain_text(conn, &sql).await;
        // Re-enable even when the second explain failed.
        let restored = conn.execute("SET hypopg.enabled TO on").await;
        let without = without?;
        restored?;
        ctx.ensure_live()?;

        ctx.append_plan(
            msg,
            "Plan without hypothetical indexes:",
            ARTIFACT_PLAN_WO_HYPO,
            &without,
        )
        .await?;
        record.response = format!("{plan}\n\n{without}");
        ctx.refresh(msg).await
    }
}
