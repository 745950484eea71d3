// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Help text.

use crate::edition::Entertainer;

const HELP_BODY: &str = "\
• `explain` - analyze your query (SELECT, INSERT, DELETE, UPDATE or WITH) and generate recommendations
• `plan` - analyze your query (SELECT, INSERT, DELETE, UPDATE or WITH) without execution
• `exec` - execute any query (for example, CREATE INDEX)
• `reset` - revert the database to the initial state (usually takes less than a minute, :warning: all changes will be lost)
• `hypo` - create hypothetical indexes using the HypoPG extension: `hypo create|desc|drop|reset`
• `activity` - show currently running sessions in Postgres (states: `active`, `idle in transaction`, `disabled`)
• `terminate [pid]` - terminate the Postgres backend that has the specified PID
• `\\d`, `\\d+`, `\\dt`, `\\dt+`, `\\di`, `\\di+`, `\\l`, `\\l+`, `\\dv`, `\\dv+`, `\\dm`, `\\dm+` - psql meta information commands
• `help` - this message";

pub fn help_message(entertainer: &dyn Entertainer, version: &str) -> String {
    let mut text = String::from(HELP_BODY);
    let addendum = entertainer.help_addendum();
    if !addendum.is_empty() {
        text.push_str("\n\n");
        text.push_str(addendum);
    }
    text.push_str(&format!(
        "\n\nVersion: {version} ({} Edition)",
        entertainer.edition()
    ));
    text
}
