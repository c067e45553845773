//! Raw-issue normalization into the unified schema.
//!
//! Each adapter parses its tool's native output into [`RawIssue`] records
//! and supplies a [`ToolProfile`] whose mapping function applies the
//! adapter's closed severity/category table. Normalization is a pure,
//! deterministic transform: canonicalize the path, clamp positions, apply
//! the mapping, derive the id, stamp confidence.

use std::collections::BTreeSet;
use std::path::Path;

use crosscheck_core::{
    issue_id, Category, Confidence, ExternalRefs, FixSuggestion, Language, Severity, UnifiedIssue,
};

use crate::correlate;

/// One tool-native finding before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawIssue {
    /// Path exactly as the tool emitted it (absolute or relative).
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    /// Tool-native rule code; `None` becomes `"unknown"`.
    pub rule: Option<String>,
    pub title: String,
    pub description: String,
    /// Tool-native severity label, lowercased by the parser.
    pub native_severity: String,
    /// Tool-native category/check label when the tool has one.
    pub native_category: Option<String>,
    /// Tool-provided confidence, overriding the per-tool default.
    pub confidence: Option<Confidence>,
    pub fix: Option<FixSuggestion>,
    pub refs: Option<ExternalRefs>,
}

/// The outcome of one table lookup.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub severity: Severity,
    pub category: Category,
    /// Overrides the profile default when set.
    pub confidence: Option<Confidence>,
    /// True when the native label fell outside the closed table.
    pub unknown_label: bool,
    /// Original tool-side label preserved for traceability when it maps
    /// to [`Category::Other`].
    pub orig_label: Option<String>,
}

/// Static description of one adapter for the normalizer and annotator.
pub struct ToolProfile {
    pub tool: &'static str,
    pub language: Language,
    pub tool_category: &'static str,
    pub default_confidence: Confidence,
    /// The adapter's closed severity/category mapping table.
    pub map: fn(&RawIssue) -> Mapping,
}

impl ToolProfile {
    /// The ecosystem tag stamped on every issue from this adapter.
    pub fn ecosystem(&self) -> &'static str {
        self.language.ecosystem_tag()
    }
}

/// Canonicalize a tool-emitted path: relativize against the project root
/// and force forward slashes. Absolute paths outside the root (system
/// headers in clang diagnostics, for instance) have no canonical form and
/// return `None`.
pub fn canonical_path(project_root: &Path, file: &str) -> Option<String> {
    let file = file.replace('\\', "/");
    let path = Path::new(&file);
    let relative = if path.is_absolute() {
        path.strip_prefix(project_root)
            .ok()?
            .to_string_lossy()
            .into_owned()
    } else {
        file
    };
    let trimmed = relative.trim_start_matches("./");
    Some(trimmed.replace('\\', "/"))
}

/// Normalize raw issues in tool-native order.
pub fn normalize(
    profile: &ToolProfile,
    project_root: &Path,
    tool_version: Option<&str>,
    raw_issues: Vec<RawIssue>,
    warnings: &mut Vec<String>,
) -> Vec<UnifiedIssue> {
    let mut issues = Vec::with_capacity(raw_issues.len());
    for raw in raw_issues {
        let mapping = (profile.map)(&raw);
        if mapping.unknown_label {
            warnings.push(format!(
                "{}: unknown severity label {:?} for rule {:?}, defaulted to medium",
                profile.tool, raw.native_severity, raw.rule
            ));
        }

        let Some(canonical) = canonical_path(project_root, &raw.file) else {
            warnings.push(format!(
                "{}: dropped finding in {:?}, outside the project root",
                profile.tool, raw.file
            ));
            continue;
        };
        let start_line = raw.line.max(1);
        let start_column = raw.column.max(1);
        let end_line = raw.end_line.unwrap_or(start_line).max(start_line);
        let end_column = raw.end_column.unwrap_or(start_column).max(1);
        let subcategory = raw.rule.clone().unwrap_or_else(|| "unknown".to_string());

        let mut tags: BTreeSet<String> = BTreeSet::new();
        tags.insert(profile.ecosystem().to_string());
        tags.insert(mapping.category.as_str().to_string());
        if let Some(orig) = &mapping.orig_label {
            tags.insert(format!("orig:{orig}"));
        }
        if mapping.unknown_label {
            tags.insert("unknown-severity".to_string());
        }

        let mut issue = UnifiedIssue {
            id: issue_id(&canonical, start_line, &subcategory, profile.tool),
            tool_name: profile.tool.to_string(),
            tool_version: tool_version.map(str::to_string),
            canonical_path: canonical,
            start_line,
            start_column,
            end_line,
            end_column,
            severity: mapping.severity,
            category: mapping.category,
            subcategory,
            title: raw.title,
            description: raw.description,
            confidence: mapping
                .confidence
                .or(raw.confidence)
                .unwrap_or(profile.default_confidence),
            tags,
            fix_suggestion: raw.fix,
            external_refs: raw.refs.filter(|r| !r.is_empty()),
            correlation_key: String::new(),
            cross_tool_patterns: BTreeSet::new(),
            correlation_hints: correlate::hints_for(profile),
        };
        correlate::annotate(&mut issue, profile);
        issues.push(issue);
    }
    issues
}
