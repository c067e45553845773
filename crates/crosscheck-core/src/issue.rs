//! The unified issue schema — the single cross-tool finding type.
//!
//! Every adapter normalizes its tool-native records into [`UnifiedIssue`]
//! so findings from unrelated tools become joinable downstream. All fields
//! serialize camelCase; issues are immutable once emitted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Severity levels, ordered ascending so `max` picks the worse one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified issue categories. Tool-side labels outside this enumeration map
/// to [`Category::Other`] and keep the original label as an `orig:` tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Security,
    MemorySafety,
    Correctness,
    Performance,
    Style,
    Complexity,
    Suspicious,
    Unused,
    Deprecated,
    DeadCode,
    Type,
    Vulnerability,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::MemorySafety => "memory-safety",
            Category::Correctness => "correctness",
            Category::Performance => "performance",
            Category::Style => "style",
            Category::Complexity => "complexity",
            Category::Suspicious => "suspicious",
            Category::Unused => "unused",
            Category::Deprecated => "deprecated",
            Category::DeadCode => "dead-code",
            Category::Type => "type",
            Category::Vulnerability => "vulnerability",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence in a finding, from formal proof down to heuristic guesswork.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Heuristic,
    Low,
    Medium,
    High,
    MathematicalProof,
}

/// Optional replacement text with its target range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion {
    pub replacement: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// External references attached by tools that carry advisory metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRefs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owasp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory_url: Option<String>,
}

impl ExternalRefs {
    pub fn is_empty(&self) -> bool {
        self.cwe.is_none() && self.owasp.is_none() && self.advisory_url.is_none()
    }
}

/// Proximity hint for downstream correlators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRadius {
    pub lines: u32,
    pub columns: u32,
}

impl Default for SearchRadius {
    fn default() -> Self {
        Self {
            lines: 5,
            columns: 10,
        }
    }
}

/// Correlation machinery attached to every issue: which adapter family it
/// came from, which ecosystem, and how far away a related finding may sit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationHints {
    pub tool_category: String,
    pub ecosystem: String,
    pub search_radius: SearchRadius,
}

/// One normalized finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedIssue {
    /// Stable hash of `(canonicalPath, startLine, ruleCode, tool)`.
    pub id: String,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    /// Relative to project root, forward-slash separated. Never escapes it.
    pub canonical_path: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub severity: Severity,
    pub category: Category,
    /// Tool-native rule identifier, `"unknown"` when the tool gave none.
    pub subcategory: String,
    pub title: String,
    pub description: String,
    pub confidence: Confidence,
    /// Always contains the ecosystem tag and the category string.
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<FixSuggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_refs: Option<ExternalRefs>,
    /// 128-bit hash of `(canonicalPath, startLine, category, tool)`.
    pub correlation_key: String,
    /// Abstract defect-class tags connecting findings across tools.
    pub cross_tool_patterns: BTreeSet<String>,
    pub correlation_hints: CorrelationHints,
}
