//! Per-tool and multi-tool report types.
//!
//! A [`ToolReport`] is the output of one adapter invocation; the
//! orchestrator joins them into a [`MultiToolReport`]. Reports are
//! immutable once built: a failed adapter carries an error string and an
//! empty issue list, never partial data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::issue::{Category, Severity, UnifiedIssue};
use crate::lang::Language;

/// Whether an adapter invocation produced issues or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// The outcome of one adapter invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReport {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    /// The analyzed project root as given to the adapter.
    pub target: String,
    pub status: ToolStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub files_analyzed: usize,
    pub issues_by_severity: BTreeMap<Severity, usize>,
    pub issues_by_category: BTreeMap<Category, usize>,
    /// Tool-native emission order.
    pub issues: Vec<UnifiedIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Counted non-fatal conditions: dropped records, unknown severities,
    /// resource caps reached.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl ToolReport {
    /// Build a successful report; counters are derived from the issues.
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        tool: &str,
        tool_version: Option<String>,
        target: String,
        issues: Vec<UnifiedIssue>,
        files_analyzed: usize,
        warnings: Vec<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut issues_by_severity = BTreeMap::new();
        let mut issues_by_category = BTreeMap::new();
        for issue in &issues {
            *issues_by_severity.entry(issue.severity).or_insert(0) += 1;
            *issues_by_category.entry(issue.category).or_insert(0) += 1;
        }
        let duration_ms = duration_ms(started_at, finished_at);
        Self {
            tool: tool.to_string(),
            tool_version,
            target,
            status: ToolStatus::Ok,
            started_at,
            finished_at,
            duration_ms,
            files_analyzed,
            issues_by_severity,
            issues_by_category,
            issues,
            error: None,
            warnings,
        }
    }

    /// Build an error report: empty issues, never partial data.
    pub fn failure(
        tool: &str,
        tool_version: Option<String>,
        target: String,
        error: &AdapterError,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tool: tool.to_string(),
            tool_version,
            target,
            status: ToolStatus::Error,
            started_at,
            finished_at,
            duration_ms: duration_ms(started_at, finished_at),
            files_analyzed: 0,
            issues_by_severity: BTreeMap::new(),
            issues_by_category: BTreeMap::new(),
            issues: Vec::new(),
            error: Some(error.to_string()),
            warnings: Vec::new(),
        }
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// Aggregate counts across all reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCounts {
    pub total_issues: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub failed_adapters: usize,
}

/// The orchestrator's final output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiToolReport {
    pub project_root: String,
    pub detected_languages: Vec<Language>,
    pub reports: Vec<ToolReport>,
    pub aggregate: AggregateCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub wall_clock_ms: u64,
}

impl MultiToolReport {
    pub fn highest_severity(&self) -> Option<Severity> {
        self.reports.iter().filter_map(|r| r.highest_severity()).max()
    }

    /// Process exit code for CLI callers: non-zero only for critical/high
    /// findings, never for adapter failure alone.
    pub fn exit_code(&self) -> i32 {
        match self.highest_severity() {
            Some(Severity::Critical) | Some(Severity::High) => 1,
            _ => 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn duration_ms(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> u64 {
    (finished_at - started_at).num_milliseconds().max(0) as u64
}
