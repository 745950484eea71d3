// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound text normalisation and command parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Chat link markup: `<https://x|label>`, `<mailto:a@b|a@b>`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<((?:https?|mailto):[^|>]+)(?:\|([^>]*))?>").unwrap()
});

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    // Last, so `&amp;lt;` becomes `&lt;` rather than `<`.
    ("&amp;", "&"),
];

pub const DML_KEYWORDS: &[&str] = &["select", "insert", "update", "delete", "with"];
pub const DDL_KEYWORDS: &[&str] = &["alter", "create", "drop", "set"];

pub const EXPLAIN_HINT: &str =
    "Consider using `explain` command for DML statements. See `help` for details.";
pub const EXEC_HINT: &str =
    "Consider using `exec` command for DDL statements. See `help` for details.";

/// Psql meta commands accepted verbatim.
pub const META_COMMANDS: &[&str] = &[
    "\\d", "\\d+", "\\dt", "\\dt+", "\\di", "\\di+", "\\l", "\\l+", "\\dv", "\\dv+", "\\dm",
    "\\dm+",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Plan,
    Explain,
    Exec,
    Reset,
    Hypo,
    Activity,
    Terminate,
    Meta(String),
}

impl Command {
    /// Maps a lowercased command token, `None` when unsupported.
    pub fn from_token(token: &str) -> Option<Self> {
        let command = match token {
            "help" => Command::Help,
            "plan" => Command::Plan,
            "explain" => Command::Explain,
            "exec" => Command::Exec,
            "reset" => Command::Reset,
            "hypo" => Command::Hypo,
            "activity" => Command::Activity,
            "terminate" => Command::Terminate,
            meta if META_COMMANDS.contains(&meta) => Command::Meta(meta.to_string()),
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Help => "help",
            Command::Plan => "plan",
            Command::Explain => "explain",
            Command::Exec => "exec",
            Command::Reset => "reset",
            Command::Hypo => "hypo",
            Command::Activity => "activity",
            Command::Terminate => "terminate",
            Command::Meta(name) => name,
        }
    }
}

/// Folds smart quotes, unescapes entities, optionally unfurls links, trims.
pub fn normalize(text: &str, unfurl_links: bool) -> String {
    let mut text: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            other => other,
        })
        .collect();

    if unfurl_links {
        text = unfurl(&text);
    }

    for (entity, plain) in HTML_ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, plain);
        }
    }

    text.trim().to_string()
}

fn unfurl(text: &str) -> String {
    LINK_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match caps.get(2).map(|m| m.as_str()).filter(|l| !l.is_empty()) {
                Some(label) => label.to_string(),
                None => {
                    let target = &caps[1];
                    target.strip_prefix("mailto:").unwrap_or(target).to_string()
                }
            }
        })
        .into_owned()
}

/// Splits into the lowercased first token and the untouched remainder.
pub fn parse(text: &str) -> (String, String) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(idx) => {
            let (command, rest) = text.split_at(idx);
            (command.to_lowercase(), rest.trim_start().to_string())
        }
        None => (text.to_lowercase(), String::new()),
    }
}

/// The usage hint for a command/query pair, if any.
pub fn hint_for(command: &str, query: &str) -> Option<&'static str> {
    if DML_KEYWORDS.contains(&command) {
        return Some(EXPLAIN_HINT);
    }
    if command == "exec" {
        let first = query
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .unwrap_or_default();
        if DML_KEYWORDS.contains(&first.as_str()) {
            return Some(EXPLAIN_HINT);
        }
    }
    if DDL_KEYWORDS.contains(&command) {
        return Some(EXEC_HINT);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smart_quotes_are_folded() {
        assert_eq!(
            normalize("exec select \u{201C}a\u{201D}, \u{2018}b\u{2019}", false),
            "exec select \"a\", 'b'"
        );
    }

    #[test]
    fn entities_are_unescaped_once() {
        assert_eq!(
            normalize("explain select 1 &lt; 2 &amp;&amp; x &gt; &#39;y&#39;", false),
            "explain select 1 < 2 && x > 'y'"
        );
        assert_eq!(normalize("&amp;lt;", false), "&lt;");
    }

    #[test]
    fn links_are_unfurled_when_enabled() {
        let text = "exec select '<http://example.com|example.com>', '<mailto:a@b.c|a@b.c>', '<https://x.io>'";
        assert_eq!(
            normalize(text, true),
            "exec select 'example.com', 'a@b.c', 'https://x.io'"
        );
        assert_eq!(normalize("<mailto:a@b.c>", true), "a@b.c");
        assert_eq!(normalize("<http://a.b|a.b>", false), "<http://a.b|a.b>");
    }

    #[test]
    fn user_mentions_are_left_alone() {
        assert_eq!(normalize("<@U123> help", true), "<@U123> help");
    }

    #[test]
    fn parse_keeps_inner_whitespace() {
        assert_eq!(
            parse("EXPLAIN  select *\n  from t"),
            ("explain".to_string(), "select *\n  from t".to_string())
        );
        assert_eq!(parse("HeLp"), ("help".to_string(), String::new()));
        assert_eq!(parse(""), (String::new(), String::new()));
    }

    #[test]
    fn parse_round_trips_command_and_tail() {
        for (cmd, tail) in [
            ("exec", "select  1"),
            ("hypo", "create index on t (a)"),
            ("\\d+", "users"),
        ] {
            let input = format!("{cmd}  {tail}");
            assert_eq!(parse(&input), (cmd.to_lowercase(), tail.to_string()));
        }
    }

    #[test]
    fn commands_are_recognised() {
        assert_eq!(Command::from_token("plan"), Some(Command::Plan));
        assert_eq!(
            Command::from_token("\\dt+"),
            Some(Command::Meta("\\dt+".into()))
        );
        assert_eq!(Command::from_token("\\x"), None);
        assert_eq!(Command::from_token("select"), None);
        assert_eq!(Command::Meta("\\l".into()).name(), "\\l");
    }

    #[test]
    fn hints_follow_keyword_class() {
        assert_eq!(hint_for("select", "1"), Some(EXPLAIN_HINT));
        assert_eq!(hint_for("exec", "UPDATE t set a = 1"), Some(EXPLAIN_HINT));
        assert_eq!(hint_for("exec", "vacuum t"), None);
        assert_eq!(hint_for("create", "index on t (a)"), Some(EXEC_HINT));
        assert_eq!(hint_for("explain", "select 1"), None);
    }
}
