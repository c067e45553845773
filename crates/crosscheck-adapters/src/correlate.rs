//! Correlation annotation: keys, ecosystem/tool-category hints, and
//! cross-tool pattern tags.
//!
//! The annotator only supplies the machinery for downstream correlators:
//! two issues may correlate on an identical key, on path proximity within
//! the search radius, or on a shared cross-tool pattern tag.

use crosscheck_core::{correlation_key, Category, CorrelationHints, SearchRadius, UnifiedIssue};

use crate::normalize::ToolProfile;

/// Build the static hints block for an adapter.
pub fn hints_for(profile: &ToolProfile) -> CorrelationHints {
    CorrelationHints {
        tool_category: profile.tool_category.to_string(),
        ecosystem: profile.ecosystem().to_string(),
        search_radius: SearchRadius::default(),
    }
}

/// Attach the correlation key and cross-tool patterns to a normalized
/// issue. Key derivation depends only on the issue's own fields, so
/// insertion order is irrelevant.
pub fn annotate(issue: &mut UnifiedIssue, profile: &ToolProfile) {
    issue.correlation_key = correlation_key(
        &issue.canonical_path,
        issue.start_line,
        issue.category.as_str(),
        profile.tool,
    );
    issue.cross_tool_patterns = cross_tool_patterns(profile.tool, &issue.subcategory, issue.category);
    for pattern in &issue.cross_tool_patterns {
        issue.tags.insert(pattern.clone());
    }
}

/// Abstract defect-class tags per tool and rule family. Fixed tables:
/// the same inputs always produce the same tags.
pub fn cross_tool_patterns(
    tool: &str,
    subcategory: &str,
    category: Category,
) -> std::collections::BTreeSet<String> {
    let mut patterns = std::collections::BTreeSet::new();
    let rule = subcategory.to_ascii_lowercase();

    match category {
        Category::DeadCode | Category::Unused => {
            patterns.insert("dead-code".to_string());
        }
        Category::Correctness => {
            patterns.insert("logical-error".to_string());
        }
        Category::Type => {
            patterns.insert("type-error".to_string());
        }
        _ => {}
    }

    match tool {
        "gosec" => {
            if rule.starts_with("g1") {
                patterns.insert("hardcoded-secret".to_string());
            }
            if rule.starts_with("g2") {
                patterns.insert("injection".to_string());
            }
            if rule.starts_with("g4") || rule.starts_with("g5") {
                patterns.insert("weak-crypto".to_string());
            }
            if rule.starts_with("g3") {
                patterns.insert("unsafe-file-access".to_string());
            }
        }
        "clang-static-analyzer" => {
            if rule.contains("nulldereference") || rule.contains("nullablederef") {
                patterns.insert("null-deref".to_string());
            }
            if rule.contains("uninitialized") {
                patterns.insert("uninitialized".to_string());
            }
            if rule.contains("malloc") || rule.contains("newdelete") {
                patterns.insert("memory-error".to_string());
            }
            if rule.contains("insecureapi") || rule.contains("security") {
                patterns.insert("weak-crypto".to_string());
            }
        }
        "valgrind" => {
            match rule.as_str() {
                "invalidread" | "invalidwrite" => {
                    patterns.insert("memory-error".to_string());
                }
                "uninitvalue" | "uninitcondition" => {
                    patterns.insert("uninitialized".to_string());
                }
                _ => {}
            }
            if rule.starts_with("leak_") {
                patterns.insert("leak".to_string());
            }
        }
        "cargo-audit" => {
            patterns.insert("known-vulnerability".to_string());
        }
        "clippy" => {
            if rule.contains("unwrap") || rule.contains("panic") {
                patterns.insert("panic-path".to_string());
            }
        }
        "staticcheck" => {
            if rule.starts_with("sa2") {
                patterns.insert("concurrency".to_string());
            }
        }
        "pylint" | "mypy" => {
            if rule.contains("unused") || subcategory.starts_with("W0611") {
                patterns.insert("dead-code".to_string());
            }
        }
        _ => {}
    }

    if category == Category::Security && (rule.contains("sql") || rule.contains("exec")) {
        patterns.insert("injection".to_string());
    }

    patterns
}
