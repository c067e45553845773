//! Analysis options: explicit fields only, unknown keys are errors.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crosscheck_core::{AdapterError, Severity, UnifiedIssue};

/// Per-run options shared by all adapters. Deserialization rejects keys
/// outside this enumeration, so a typoed option fails the run instead of
/// being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AnalyzeOptions {
    /// Issues below this severity are dropped after normalization.
    pub severity_threshold: Severity,
    /// Rule codes to keep; empty keeps everything.
    pub include_rules: BTreeSet<String>,
    /// Rule codes to drop; applied after `include_rules`.
    pub exclude_rules: BTreeSet<String>,
    /// Batch size for per-file tools (clang, pylint).
    pub batch_size: usize,
    pub timeout_ms: u64,
    /// Worker pool size; 0 = min(CPU count, 4).
    pub parallelism: usize,
    /// Tool names to run; empty runs every available adapter.
    pub tool_selection: BTreeSet<String>,
    pub include_tests: bool,
    /// Discovery cap for file-list-based tools.
    pub max_files: usize,
    /// Binary for the valgrind adapter to analyze. Without it the
    /// adapter reports unavailability rather than executing anything.
    pub valgrind_binary: Option<PathBuf>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Info,
            include_rules: BTreeSet::new(),
            exclude_rules: BTreeSet::new(),
            batch_size: 16,
            timeout_ms: 120_000,
            parallelism: 0,
            tool_selection: BTreeSet::new(),
            include_tests: false,
            max_files: 1000,
            valgrind_binary: None,
        }
    }
}

impl AnalyzeOptions {
    /// Parse from JSON, surfacing unknown keys as `UnknownOption`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AdapterError> {
        serde_json::from_value(value).map_err(|err| AdapterError::UnknownOption {
            detail: err.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a rule code survives the include/exclude lists.
    pub fn rule_selected(&self, rule: &str) -> bool {
        if !self.include_rules.is_empty() && !self.include_rules.contains(rule) {
            return false;
        }
        !self.exclude_rules.contains(rule)
    }

    /// Whether a tool is selected for this run.
    pub fn tool_selected(&self, tool: &str) -> bool {
        self.tool_selection.is_empty() || self.tool_selection.contains(tool)
    }

    /// Post-normalization filter: severity threshold plus rule lists,
    /// applied uniformly after every adapter's mapping table.
    pub fn apply_filters(&self, issues: Vec<UnifiedIssue>) -> Vec<UnifiedIssue> {
        issues
            .into_iter()
            .filter(|issue| {
                issue.severity >= self.severity_threshold && self.rule_selected(&issue.subcategory)
            })
            .collect()
    }
}
