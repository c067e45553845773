//! Property tests for report assembly.

use std::path::Path;

use chrono::Utc;
use crosscheck::assemble::{aggregate, assemble};
use crosscheck_adapters::{normalize, Mapping, RawIssue, ToolProfile};
use crosscheck_core::{Category, Confidence, Language, Severity, ToolReport};
use proptest::prelude::*;

fn profile(tool: &'static str) -> ToolProfile {
    ToolProfile {
        tool,
        language: Language::Rust,
        tool_category: "prop_analysis",
        default_confidence: Confidence::Medium,
        map: |raw| Mapping {
            severity: match raw.native_severity.as_str() {
                "error" => Severity::High,
                "warning" => Severity::Medium,
                _ => Severity::Low,
            },
            category: Category::Correctness,
            confidence: None,
            unknown_label: false,
            orig_label: None,
        },
    }
}

fn report_strategy() -> impl Strategy<Value = ToolReport> {
    (
        prop::sample::select(vec!["alpha", "beta", "gamma"]),
        prop::collection::vec(
            (
                "[a-z][a-z0-9_/]{0,20}\\.rs",
                1u32..10_000,
                prop::sample::select(vec!["error", "warning", "note"]),
            ),
            0..5,
        ),
    )
        .prop_map(|(tool, findings)| {
            let raw: Vec<RawIssue> = findings
                .into_iter()
                .map(|(file, line, severity)| RawIssue {
                    file,
                    line,
                    column: 1,
                    rule: Some("R001".to_string()),
                    title: "t".to_string(),
                    description: "d".to_string(),
                    native_severity: severity.to_string(),
                    ..RawIssue::default()
                })
                .collect();
            let mut warnings = Vec::new();
            let issues = normalize(&profile(tool), Path::new("/p"), None, raw, &mut warnings);
            let now = Utc::now();
            let count = issues.len();
            ToolReport::success(tool, None, "/p".into(), issues, count, warnings, now, now)
        })
}

proptest! {
    #[test]
    fn report_order_does_not_change_the_aggregate(
        reports in prop::collection::vec(report_strategy(), 0..5).prop_shuffle()
    ) {
        let mut reversed = reports.clone();
        reversed.reverse();
        let forward = aggregate(&reports);
        let backward = aggregate(&reversed);
        prop_assert_eq!(forward.total_issues, backward.total_issues);
        prop_assert_eq!(forward.by_severity, backward.by_severity);
        prop_assert_eq!(forward.by_category, backward.by_category);
        prop_assert_eq!(forward.failed_adapters, backward.failed_adapters);
    }

    #[test]
    fn assembly_leaves_correlation_keys_untouched(
        reports in prop::collection::vec(report_strategy(), 0..5).prop_shuffle()
    ) {
        let before: Vec<String> = reports
            .iter()
            .flat_map(|r| r.issues.iter().map(|i| i.correlation_key.clone()))
            .collect();
        let started_at = Utc::now();
        let multi = assemble(Path::new("/p"), vec![Language::Rust], reports, started_at);
        let after: Vec<String> = multi
            .reports
            .iter()
            .flat_map(|r| r.issues.iter().map(|i| i.correlation_key.clone()))
            .collect();
        prop_assert_eq!(before, after);
        let exit = multi.exit_code();
        prop_assert!(exit == 0 || exit == 1);
    }
}
