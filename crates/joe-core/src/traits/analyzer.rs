// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::JoeError;
use crate::types::PlanAnalysis;

/// Turns `EXPLAIN (ANALYZE, FORMAT JSON)` output into text, tips and stats.
pub trait PlanAnalyzer: Send + Sync {
    fn analyze(&self, plan_json: &str) -> Result<PlanAnalysis, JoeError>;
}
