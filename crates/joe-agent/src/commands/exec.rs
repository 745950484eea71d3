// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Instant;

use async_trait::async_trait;
use joe_core::JoeError;
use joe_core::types::{CommandRecord, Message};
use tracing::debug;

use super::{CommandContext, CommandHandler};

/// `exec`: runs the statement as is and reports how long it took.
#[derive(Debug, Default)]
pub struct ExecCommand;

#[async_trait]
impl CommandHandler for ExecCommand {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        if record.query.trim().is_empty() {
            return Err(JoeError::usage("query is required"));
        }

        let started = Instant::now();
        let affected = ctx.connection.execute(&record.query).await?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        ctx.ensure_live()?;
        debug!(affected, elapsed_ms, "exec finished");

        let result = format!("The query has been executed. Duration: {elapsed_ms:.3} ms");
        msg.append_text(&result);
        record.response = result;
        ctx.refresh(msg).await
    }
}
