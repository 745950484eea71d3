// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `explain`: plan without execution, then `EXPLAIN ANALYZE` with analysis.

use async_trait::async_trait;
use joe_core::JoeError;
use joe_core::types::{CommandRecord, Message, Tip};
use tracing::{debug, warn};

use super::plan::{ARTIFACT_PLAN, explain_sql};
use super::{CommandContext, CommandHandler, explain_text};
use crate::estimator::Estimator;

pub const ARTIFACT_PLAN_JSON: &str = "plan-json";
pub const ARTIFACT_PLAN_TEXT: &str = "plan-text";

pub const LOOKS_GOOD: &str = ":white_check_mark: Looks good";

/// First server version accepting `SETTINGS` in `EXPLAIN`.
const SETTINGS_MIN_VERSION: u32 = 120_000;

#[derive(Debug, Default)]
pub struct ExplainCommand;

pub(crate) fn analyze_sql(query: &str, with_settings: bool) -> String {
    let settings = if with_settings { ", SETTINGS TRUE" } else { "" };
    format!("EXPLAIN (ANALYZE, COSTS, VERBOSE, BUFFERS, FORMAT JSON{settings}) {query}")
}

pub fn format_tips(tips: &[Tip]) -> String {
    if tips.is_empty() {
        return LOOKS_GOOD.to_string();
    }
    tips.iter()
        .map(|t| format!(":exclamation: {} - {} <{}|Show details>", t.name, t.description, t.details_url))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl CommandHandler for ExplainCommand {
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

        let plan = explain_text(conn, &explain_sql(&record.query)).await?;
        ctx.ensure_live()?;
        record.plan_text = plan.clone();
        ctx.append_plan(msg, "Plan without execution:", ARTIFACT_PLAN, &plan)
            .await?;
        ctx.refresh(msg).await?;

        let version = conn.server_version_num().await?;
        let sql = analyze_sql(&record.query, version >= SETTINGS_MIN_VERSION);

        let profile = match ctx.estimator {
            Some(estimator) => start_profile(ctx, estimator).await,
            None => None,
        };

        let analyzed = conn.query(&sql, &[]).await;
        let samples = match profile {
            Some(handle) => handle.finish().await,
            None => Vec::new(),
        };
        let rows = analyzed?;
        ctx.ensure_live()?;

        let plan_json = rows
            .scalar()
            .ok_or_else(|| JoeError::Internal("EXPLAIN returned no plan".into()))?
            .to_string();
        let analysis = ctx.analyzer.analyze(&plan_json)?;

        let mut stats = analysis.stats.clone();
        if let (Some(estimator), Some(elapsed)) = (ctx.estimator, analysis.execution_time_ms)
            && let Some(estimate) = estimator.estimate(&samples, elapsed)
        {
            stats.push('\n');
            stats.push_str(&Estimator::summary_line(estimate));
        }

        record.plan_exec_json = plan_json.clone();
        record.plan_exec_text = analysis.plan_text.clone();
        record.recommendations = format_tips(&analysis.tips);
        record.stats = stats.clone();
        record.response = analysis.plan_text.clone();

        let pretty = serde_json::from_str::<serde_json::Value>(&plan_json)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or(plan_json);
        ctx.upload(msg, ARTIFACT_PLAN_JSON, &pretty).await?;
        ctx.append_plan(msg, "Plan with execution:", ARTIFACT_PLAN_TEXT, &analysis.plan_text)
            .await?;
        msg.append_text(&format!("Recommendations:\n{}", record.recommendations));
        msg.append_text(&format!("Summary:\n```{stats}```"));
        ctx.refresh(msg).await
    }
}

async fn start_profile(
    ctx: &CommandContext<'_>,
    estimator: &Estimator,
) -> Option<crate::estimator::ProfileHandle> {
    let pid = match ctx.connection.query("select pg_backend_pid()::text", &[]).await {
        Ok(rows) => rows.scalar().and_then(|p| p.parse::<i32>().ok()),
        Err(e) => {
            warn!(error = %e, "cannot read backend pid, skipping timing estimate");
            None
        }
    }?;
    debug!(pid, "profiling explain backend");
    Some(estimator.start(ctx.connections, ctx.params, pid, ctx.cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_are_added_on_newer_servers() {
        assert_eq!(
            analyze_sql("select 1", true),
            "EXPLAIN (ANALYZE, COSTS, VERBOSE, BUFFERS, FORMAT JSON, SETTINGS TRUE) select 1"
        );
        assert_eq!(
            analyze_sql("select 1", false),
            "EXPLAIN (ANALYZE, COSTS, VERBOSE, BUFFERS, FORMAT JSON) select 1"
        );
    }

    #[test]
    fn tips_render_one_per_line() {
        assert_eq!(format_tips(&[]), LOOKS_GOOD);
        let tips = vec![Tip {
            code: "SEQSCAN_USED".into(),
            name: "SeqScan is used".into(),
            description: "consider adding an index".into(),
            details_url: "https://example.com/seqscan".into(),
        }];
        assert_eq!(
            format_tips(&tips),
            ":exclamation: SeqScan is used - consider adding an index <https://example.com/seqscan|Show details>"
        );
    }
}
