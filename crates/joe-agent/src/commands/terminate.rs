// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use joe_core::JoeError;
use joe_core::types::{CommandRecord, Message};

use super::{CommandContext, CommandHandler, format_table};

/// `terminate <pid>`: `pg_terminate_backend` on the clone.
#[derive(Debug, Default)]
pub struct TerminateCommand;

pub fn parse_pid(query: &str) -> Result<i32, JoeError> {
    query
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| JoeError::usage("pid should be a number"))
}

#[async_trait]
impl CommandHandler for TerminateCommand {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        let pid = parse_pid(&record.query)?.to_string();
        let rows = ctx
            .connection
            .query(
                "select pg_terminate_backend($1::int)::text as pg_terminate_backend",
                &[&pid],
            )
            .await?;
        ctx.ensure_live()?;

        let output = format!("```{}```", format_table(&rows));
        msg.append_text(&output);
        record.response = output;
        ctx.refresh(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_must_be_numeric() {
        assert_eq!(parse_pid(" 4242 ").unwrap(), 4242);
        for bad in ["", "abc", "12;", "-1"] {
            assert_eq!(
                parse_pid(bad).unwrap_err().to_string(),
                "pid should be a number"
            );
        }
    }
}
