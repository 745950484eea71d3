// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! psql meta commands (`\d`, `\dt+`, ...).
//!
//! The command text reaches psql verbatim, so the argument must be a single
//! plain token: psql would run anything after a backslash or separator.

use async_trait::async_trait;
use joe_core::JoeError;
use joe_core::types::{CommandRecord, Message};

use super::{CommandContext, CommandHandler};

pub const ARTIFACT_PSQL: &str = "psql-output";

pub const META_ARGS_ERROR: &str =
    "Meta command arguments must not contain semicolons, newlines, spaces or backslashes";

const FORBIDDEN: &[char] = &[';', '\n', '\r', ' ', '\t', '\\'];

/// Builds the command line sent to psql, rejecting unsafe arguments.
pub fn sanitize(command: &str, args: &str) -> Result<String, JoeError> {
    let args = args.trim();
    if args.contains(FORBIDDEN) {
        return Err(JoeError::usage(META_ARGS_ERROR));
    }
    let body = command.strip_prefix('\\').unwrap_or(command);
    if body.contains(FORBIDDEN) {
        return Err(JoeError::usage(META_ARGS_ERROR));
    }

    if args.is_empty() {
        Ok(command.to_string())
    } else {
        Ok(format!("{command} {args}"))
    }
}

#[derive(Debug, Default)]
pub struct MetaCommand;

#[async_trait]
impl CommandHandler for MetaCommand {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        let line = sanitize(&record.command, &record.query)?;

        ctx.ensure_live()?;
        let output = ctx.psql.run(ctx.params, &line).await?;
        ctx.ensure_live()?;

        ctx.append_output(msg, ARTIFACT_PSQL, &output).await?;
        record.response = output;
        ctx.refresh(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_token_argument_is_accepted() {
        assert_eq!(sanitize("\\d+", "users").unwrap(), "\\d+ users");
        assert_eq!(sanitize("\\l", "").unwrap(), "\\l");
        assert_eq!(sanitize("\\dt", "public.*").unwrap(), "\\dt public.*");
    }

    #[test]
    fn separators_are_rejected() {
        for args in ["users; drop table x", "users\n\\! rm -rf /", "a b", "users\\gexec"] {
            let err = sanitize("\\d+", args).unwrap_err();
            assert_eq!(err.to_string(), META_ARGS_ERROR, "args {args:?}");
        }
    }
}
