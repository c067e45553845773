//! Property tests for the normalization pipeline.

use std::path::Path;

use crosscheck_adapters::{normalize, Mapping, RawIssue, ToolProfile};
use crosscheck_core::{Category, Confidence, Language, Severity};
use proptest::prelude::*;

fn profile() -> ToolProfile {
    ToolProfile {
        tool: "prop-tool",
        language: Language::Python,
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

fn raw_issue_strategy() -> impl Strategy<Value = RawIssue> {
    (
        // Relative paths only, absolute ones outside the root are dropped.
        "[a-zA-Z0-9_.][a-zA-Z0-9_./\\\\-]{0,39}",
        0u32..50_000,
        0u32..500,
        proptest::option::of(0u32..50_000),
        proptest::option::of("[A-Z][0-9]{3}"),
        prop::sample::select(vec!["error", "warning", "note"]),
    )
        .prop_map(|(file, line, column, end_line, rule, severity)| RawIssue {
            file,
            line,
            column,
            end_line,
            end_column: None,
            rule,
            title: "t".to_string(),
            description: "d".to_string(),
            native_severity: severity.to_string(),
            ..RawIssue::default()
        })
}

proptest! {
    #[test]
    fn normalized_positions_are_clamped(raw in raw_issue_strategy()) {
        let mut warnings = Vec::new();
        let issues = normalize(&profile(), Path::new("/p"), None, vec![raw], &mut warnings);
        let issue = &issues[0];
        prop_assert!(issue.start_line >= 1);
        prop_assert!(issue.start_column >= 1);
        prop_assert!(issue.end_line >= issue.start_line);
        prop_assert!(issue.end_column >= 1);
    }

    #[test]
    fn canonical_paths_use_forward_slashes(raw in raw_issue_strategy()) {
        let mut warnings = Vec::new();
        let issues = normalize(&profile(), Path::new("/p"), None, vec![raw], &mut warnings);
        prop_assert!(!issues[0].canonical_path.contains('\\'));
    }

    #[test]
    fn identity_fields_are_well_formed(raw in raw_issue_strategy()) {
        let mut warnings = Vec::new();
        let issues = normalize(&profile(), Path::new("/p"), None, vec![raw], &mut warnings);
        let issue = &issues[0];
        prop_assert_eq!(issue.id.len(), 16);
        prop_assert_eq!(issue.correlation_key.len(), 32);
        prop_assert!(issue.tags.contains("python"));
        prop_assert!(issue.subcategory.len() >= 1);
    }

    #[test]
    fn paths_escaping_the_root_never_surface(raw in raw_issue_strategy()) {
        let mut raw = raw;
        raw.file = format!("/escape/{}", raw.file);
        let mut warnings = Vec::new();
        let issues = normalize(&profile(), Path::new("/p"), None, vec![raw], &mut warnings);
        prop_assert!(issues.is_empty());
        prop_assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn normalization_is_deterministic(raw in raw_issue_strategy()) {
        let mut w1 = Vec::new();
        let mut w2 = Vec::new();
        let a = normalize(&profile(), Path::new("/p"), Some("1.0"), vec![raw.clone()], &mut w1);
        let b = normalize(&profile(), Path::new("/p"), Some("1.0"), vec![raw], &mut w2);
        prop_assert_eq!(&a[0].id, &b[0].id);
        prop_assert_eq!(&a[0].correlation_key, &b[0].correlation_key);
        prop_assert_eq!(a[0].severity, b[0].severity);
    }
}
