// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in `EXPLAIN (FORMAT JSON)` analyzer.
//!
//! Renders the plan as an indented tree, summarises timing and buffer usage,
//! and flags two problems: sequential scans that throw away many rows, and
//! queries that read a lot of data from disk.

use std::fmt::Write as _;

use joe_core::types::{PlanAnalysis, Tip};
use joe_core::{JoeError, PlanAnalyzer};
use serde_json::{Map, Value};

const BLOCK_SIZE: u64 = 8192;

/// Minimum rows removed by a sequential scan's filter to raise a tip.
pub const SEQSCAN_ROWS_REMOVED_MIN: f64 = 1000.0;

/// Bytes read from outside the buffer pool above which a tip is raised.
pub const BUFFERS_READ_BIG_BYTES: u64 = 100 * 1024 * 1024;

pub const TIP_SEQSCAN_USED: &str = "SEQSCAN_USED";
pub const TIP_BUFFERS_READ_BIG: &str = "BUFFERS_READ_BIG";

#[derive(Debug, Clone, Default)]
pub struct BasicPlanAnalyzer;

impl PlanAnalyzer for BasicPlanAnalyzer {
    fn analyze(&self, plan_json: &str) -> Result<PlanAnalysis, JoeError> {
        let parsed: Value = serde_json::from_str(plan_json)
            .map_err(|e| JoeError::Internal(format!("cannot parse plan JSON: {e}")))?;

        let explain = match &parsed {
            Value::Array(items) => items.first(),
            Value::Object(_) => Some(&parsed),
            _ => None,
        }
        .and_then(Value::as_object)
        .ok_or_else(|| JoeError::Internal("plan JSON has no explain object".into()))?;

        let root = explain
            .get("Plan")
            .and_then(Value::as_object)
            .ok_or_else(|| JoeError::Internal("plan JSON has no `Plan` node".into()))?;

        let mut plan_text = String::new();
        render_node(root, "", "  ", &mut plan_text);

        let mut tips = Vec::new();
        collect_seqscan_tips(root, &mut tips);
        let read_bytes = blocks(root, "Shared Read Blocks") * BLOCK_SIZE;
        if read_bytes > BUFFERS_READ_BIG_BYTES {
            tips.push(Tip {
                code: TIP_BUFFERS_READ_BIG.into(),
                name: "Query processes too much data".into(),
                description: format!(
                    "{} read from disk or the OS cache; consider narrowing the scanned range",
                    human_bytes(read_bytes)
                ),
                details_url: "https://www.postgresql.org/docs/current/using-explain.html#USING-EXPLAIN-ANALYZE".into(),
            });
        }

        let execution_time_ms = number(explain, "Execution Time");
        let stats = render_stats(explain, root);

        Ok(PlanAnalysis {
            plan_text: plan_text.trim_end().to_string(),
            tips,
            stats,
            execution_time_ms,
        })
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn text<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn blocks(obj: &Map<String, Value>, key: &str) -> u64 {
    obj.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn children(node: &Map<String, Value>) -> impl Iterator<Item = &Map<String, Value>> {
    node.get("Plans")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn render_node(node: &Map<String, Value>, prefix: &str, detail: &str, out: &mut String) {
    let node_type = text(node, "Node Type").unwrap_or("Unknown");
    let _ = write!(out, "{prefix}{node_type}");

    if let Some(index) = text(node, "Index Name") {
        let _ = write!(out, " using {index}");
    }
    if let Some(relation) = text(node, "Relation Name") {
        let _ = write!(out, " on {relation}");
        if let Some(alias) = text(node, "Alias").filter(|a| *a != relation) {
            let _ = write!(out, " {alias}");
        }
    }

    if let (Some(startup), Some(total)) = (number(node, "Startup Cost"), number(node, "Total Cost"))
    {
        let _ = write!(
            out,
            "  (cost={startup:.2}..{total:.2} rows={} width={})",
            number(node, "Plan Rows").unwrap_or(0.0),
            number(node, "Plan Width").unwrap_or(0.0)
        );
    }
    if let (Some(startup), Some(total)) = (
        number(node, "Actual Startup Time"),
        number(node, "Actual Total Time"),
    ) {
        let _ = write!(
            out,
            " (actual time={startup:.3}..{total:.3} rows={} loops={})",
            number(node, "Actual Rows").unwrap_or(0.0),
            number(node, "Actual Loops").unwrap_or(0.0)
        );
    }
    out.push('\n');

    for key in ["Index Cond", "Hash Cond", "Join Filter", "Filter"] {
        if let Some(cond) = text(node, key) {
            let _ = writeln!(out, "{detail}{key}: {cond}");
        }
    }
    if let Some(removed) = number(node, "Rows Removed by Filter") {
        let _ = writeln!(out, "{detail}Rows Removed by Filter: {removed}");
    }

    let buffers: Vec<String> = [
        ("hit", "Shared Hit Blocks"),
        ("read", "Shared Read Blocks"),
        ("dirtied", "Shared Dirtied Blocks"),
        ("written", "Shared Written Blocks"),
    ]
    .into_iter()
    .filter_map(|(label, key)| {
        let n = blocks(node, key);
        (n > 0).then(|| format!("{label}={n}"))
    })
    .collect();
    if !buffers.is_empty() {
        let _ = writeln!(out, "{detail}Buffers: shared {}", buffers.join(" "));
    }

    let child_prefix = format!("{detail}->  ");
    let child_detail = format!("{detail}      ");
    for child in children(node) {
        render_node(child, &child_prefix, &child_detail, out);
    }
}

fn collect_seqscan_tips(node: &Map<String, Value>, tips: &mut Vec<Tip>) {
    if text(node, "Node Type") == Some("Seq Scan") {
        let loops = number(node, "Actual Loops").unwrap_or(1.0).max(1.0);
        let removed = number(node, "Rows Removed by Filter").unwrap_or(0.0) * loops;
        let returned = number(node, "Actual Rows").unwrap_or(0.0) * loops;

        if removed >= SEQSCAN_ROWS_REMOVED_MIN && removed > returned {
            let relation = text(node, "Relation Name").unwrap_or("a table");
            tips.push(Tip {
                code: TIP_SEQSCAN_USED.into(),
                name: "SeqScan is used".into(),
                description: format!(
                    "sequential scan on {relation} removed {removed} rows by filter, consider adding an index"
                ),
                details_url: "https://www.postgresql.org/docs/current/indexes-intro.html".into(),
            });
        }
    }

    for child in children(node) {
        collect_seqscan_tips(child, tips);
    }
}

fn render_stats(explain: &Map<String, Value>, root: &Map<String, Value>) -> String {
    let planning = number(explain, "Planning Time").unwrap_or(0.0);
    let execution = number(explain, "Execution Time").unwrap_or(0.0);

    let mut out = String::new();
    let _ = writeln!(out, "Time: {}", human_ms(planning + execution));
    let _ = writeln!(out, "  - planning: {}", human_ms(planning));
    let _ = writeln!(out, "  - execution: {}", human_ms(execution));
    if let Some(io_read) = number(root, "I/O Read Time") {
        let _ = writeln!(out, "    - I/O read: {}", human_ms(io_read));
    }
    if let Some(io_write) = number(root, "I/O Write Time") {
        let _ = writeln!(out, "    - I/O write: {}", human_ms(io_write));
    }

    let hit = blocks(root, "Shared Hit Blocks");
    let read = blocks(root, "Shared Read Blocks");
    let dirtied = blocks(root, "Shared Dirtied Blocks");
    let written = blocks(root, "Shared Written Blocks");

    out.push('\n');
    let _ = writeln!(out, "Shared buffers:");
    let _ = writeln!(
        out,
        "  - hits: {hit} ({}) from the buffer pool",
        human_bytes(hit * BLOCK_SIZE)
    );
    let _ = writeln!(
        out,
        "  - reads: {read} ({}) from the OS file cache, including disk I/O",
        human_bytes(read * BLOCK_SIZE)
    );
    let _ = writeln!(out, "  - dirtied: {dirtied} ({})", human_bytes(dirtied * BLOCK_SIZE));
    let _ = write!(out, "  - writes: {written} ({})", human_bytes(written * BLOCK_SIZE));
    out
}

fn human_ms(ms: f64) -> String {
    if ms >= 60_000.0 {
        format!("{:.3} min", ms / 60_000.0)
    } else if ms >= 1000.0 {
        format!("{:.3} s", ms / 1000.0)
    } else {
        format!("{ms:.3} ms")
    }
}

/// Formats a byte count with binary units.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64;
    let mut unit = "bytes";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("~{value:.2} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"[{
        "Plan": {
            "Node Type": "Result",
            "Startup Cost": 0.0, "Total Cost": 0.01, "Plan Rows": 1, "Plan Width": 4,
            "Actual Startup Time": 0.001, "Actual Total Time": 0.002,
            "Actual Rows": 1, "Actual Loops": 1,
            "Shared Hit Blocks": 0, "Shared Read Blocks": 0
        },
        "Planning Time": 0.05,
        "Execution Time": 0.011
    }]"#;

    fn seqscan_plan(removed: u64, read_blocks: u64) -> String {
        format!(
            r#"[{{
            "Plan": {{
                "Node Type": "Aggregate",
                "Startup Cost": 10.0, "Total Cost": 10.1, "Plan Rows": 1, "Plan Width": 8,
                "Actual Startup Time": 5.0, "Actual Total Time": 5.1,
                "Actual Rows": 1, "Actual Loops": 1,
                "Shared Hit Blocks": 12, "Shared Read Blocks": {read_blocks},
                "Plans": [{{
                    "Node Type": "Seq Scan",
                    "Relation Name": "orders", "Alias": "o",
                    "Startup Cost": 0.0, "Total Cost": 9.0, "Plan Rows": 10, "Plan Width": 0,
                    "Actual Startup Time": 0.1, "Actual Total Time": 4.9,
                    "Actual Rows": 3, "Actual Loops": 1,
                    "Filter": "(status = 'new'::text)",
                    "Rows Removed by Filter": {removed},
                    "Shared Hit Blocks": 12, "Shared Read Blocks": {read_blocks}
                }}]
            }},
            "Planning Time": 0.2,
            "Execution Time": 5.3
        }}]"#
        )
    }

    #[test]
    fn simple_plan_has_no_tips() {
        let analysis = BasicPlanAnalyzer.analyze(SIMPLE).unwrap();
        assert!(analysis.tips.is_empty());
        assert!(analysis.plan_text.starts_with("Result  (cost=0.00..0.01 rows=1 width=4)"));
        assert_eq!(analysis.execution_time_ms, Some(0.011));
        assert!(analysis.stats.contains("Time: 0.061 ms"));
        assert!(analysis.stats.contains("  - hits: 0 (0 bytes) from the buffer pool"));
    }

    #[test]
    fn tree_renders_children_with_arrows() {
        let analysis = BasicPlanAnalyzer.analyze(&seqscan_plan(10, 0)).unwrap();
        let lines: Vec<&str> = analysis.plan_text.lines().collect();
        assert!(lines[0].starts_with("Aggregate"));
        assert!(lines.iter().any(|l| l.starts_with("  ->  Seq Scan on orders o")));
        assert!(lines.iter().any(|l| l.trim() == "Filter: (status = 'new'::text)"));
        assert!(lines.iter().any(|l| l.trim() == "Buffers: shared hit=12"));
    }

    #[test]
    fn seqscan_removing_many_rows_is_flagged() {
        let analysis = BasicPlanAnalyzer.analyze(&seqscan_plan(50_000, 0)).unwrap();
        assert_eq!(analysis.tips.len(), 1);
        assert_eq!(analysis.tips[0].code, TIP_SEQSCAN_USED);
        assert!(analysis.tips[0].description.contains("orders"));

        let few = BasicPlanAnalyzer.analyze(&seqscan_plan(999, 0)).unwrap();
        assert!(few.tips.is_empty());
    }

    #[test]
    fn big_reads_are_flagged() {
        // 12_801 blocks * 8 KiB is just over 100 MiB.
        let analysis = BasicPlanAnalyzer.analyze(&seqscan_plan(0, 12_801)).unwrap();
        assert!(analysis.tips.iter().any(|t| t.code == TIP_BUFFERS_READ_BIG));
        assert!(analysis.stats.contains("  - reads: 12801 (~100.01 MiB)"));

        let at_limit = BasicPlanAnalyzer.analyze(&seqscan_plan(0, 12_800)).unwrap();
        assert!(at_limit.tips.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(BasicPlanAnalyzer.analyze("not json").is_err());
        assert!(BasicPlanAnalyzer.analyze("[{}]").is_err());
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(human_bytes(512), "512 bytes");
        assert_eq!(human_bytes(8192), "~8.00 KiB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "~3.00 MiB");
    }
}
