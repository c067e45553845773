//! Final report assembly: per-tool reports into one multi-tool report.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crosscheck_core::{AggregateCounts, Language, MultiToolReport, ToolReport, ToolStatus};

/// Derive the aggregate counters from a slice of per-tool reports.
pub fn aggregate(reports: &[ToolReport]) -> AggregateCounts {
    let mut by_severity = BTreeMap::new();
    let mut by_category = BTreeMap::new();
    let mut total_issues = 0usize;
    let mut failed_adapters = 0usize;

    for report in reports {
        if report.status == ToolStatus::Error {
            failed_adapters += 1;
        }
        total_issues += report.issues.len();
        for issue in &report.issues {
            *by_severity.entry(issue.severity).or_insert(0) += 1;
            *by_category.entry(issue.category).or_insert(0) += 1;
        }
    }

    AggregateCounts {
        total_issues,
        by_severity,
        by_category,
        failed_adapters,
    }
}

/// Build the final report. Reports stay in adapter registration order.
pub fn assemble(
    project_root: &Path,
    detected_languages: Vec<Language>,
    reports: Vec<ToolReport>,
    started_at: DateTime<Utc>,
) -> MultiToolReport {
    let finished_at = Utc::now();
    let wall_clock_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
    MultiToolReport {
        project_root: project_root.display().to_string(),
        detected_languages,
        aggregate: aggregate(&reports),
        reports,
        started_at,
        finished_at,
        wall_clock_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::{AdapterError, Category, Severity};

    #[test]
    fn aggregate_counts_failures_and_issues() {
        let now = Utc::now();
        let err = AdapterError::ToolUnavailable { tool: "gosec" };
        let reports = vec![
            ToolReport::success("clippy", None, "/p".into(), vec![], 3, vec![], now, now),
            ToolReport::failure("gosec", None, "/p".into(), &err, now, now),
        ];
        let counts = aggregate(&reports);
        assert_eq!(counts.total_issues, 0);
        assert_eq!(counts.failed_adapters, 1);
        assert!(counts.by_severity.is_empty());
    }

    #[test]
    fn assemble_preserves_report_order() {
        let now = Utc::now();
        let reports = vec![
            ToolReport::success("clippy", None, "/p".into(), vec![], 1, vec![], now, now),
            ToolReport::success("cargo-audit", None, "/p".into(), vec![], 1, vec![], now, now),
        ];
        let multi = assemble(Path::new("/p"), vec![Language::Rust], reports, now);
        assert_eq!(multi.reports[0].tool, "clippy");
        assert_eq!(multi.reports[1].tool, "cargo-audit");
        assert_eq!(multi.detected_languages, vec![Language::Rust]);
    }

    #[test]
    fn aggregate_severity_buckets() {
        use crosscheck_core::{Confidence, CorrelationHints, SearchRadius, UnifiedIssue};
        use std::collections::BTreeSet;

        let issue = |severity| UnifiedIssue {
            id: "0".repeat(16),
            tool_name: "stub".into(),
            tool_version: None,
            canonical_path: "a.rs".into(),
            start_line: 1,
            start_column: 1,
            end_line: 1,
            end_column: 1,
            severity,
            category: Category::Style,
            subcategory: "s".into(),
            title: "t".into(),
            description: "d".into(),
            confidence: Confidence::Medium,
            tags: BTreeSet::new(),
            fix_suggestion: None,
            external_refs: None,
            correlation_key: "0".repeat(32),
            cross_tool_patterns: BTreeSet::new(),
            correlation_hints: CorrelationHints {
                tool_category: "stub".into(),
                ecosystem: "rust".into(),
                search_radius: SearchRadius::default(),
            },
        };
        let now = Utc::now();
        let reports = vec![ToolReport::success(
            "stub",
            None,
            "/p".into(),
            vec![issue(Severity::High), issue(Severity::High), issue(Severity::Low)],
            1,
            vec![],
            now,
            now,
        )];
        let counts = aggregate(&reports);
        assert_eq!(counts.total_issues, 3);
        assert_eq!(counts.by_severity[&Severity::High], 2);
        assert_eq!(counts.by_category[&Category::Style], 3);
    }
}
