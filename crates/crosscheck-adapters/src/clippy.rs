//! clippy adapter: Rust lints via `cargo clippy --message-format=json`.
//!
//! Output is newline-delimited JSON; only `compiler-message` records with
//! a lint code are findings, the build chatter around them is skipped.
//! Lint names are mapped through a closed group table; lints outside the
//! table land in style at low severity.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crosscheck_core::{
    discover, AdapterError, Category, Confidence, DiscoverConfig, FixSuggestion, Language,
    SandboxedRunner, Severity, ToolReport,
};

use crate::adapter::{
    finish_report, map_exec_err, require_within_timeout, AnalysisOutput, BoundCommand,
    Capabilities, InstallHint, ProbeResult, ToolAdapter,
};
use crate::normalize::{normalize, Mapping, RawIssue, ToolProfile};
use crate::options::AnalyzeOptions;
use crate::project;

const TOOL: &str = "clippy";
const VERSION_ARGS: &[&str] = &["clippy", "--version"];

/// Deny-by-default correctness lints kept at high severity.
const CORRECTNESS_LINTS: &[&str] = &[
    "absurd_extreme_comparisons",
    "almost_swapped",
    "approx_constant",
    "bad_bit_mask",
    "eq_op",
    "erasing_op",
    "if_same_then_else",
    "ifs_same_cond",
    "invalid_regex",
    "iter_next_loop",
    "never_loop",
    "out_of_bounds_indexing",
    "reversed_empty_ranges",
    "self_assignment",
    "unit_cmp",
    "while_immutable_condition",
];

const SUSPICIOUS_LINTS: &[&str] = &[
    "empty_loop",
    "float_equality_without_abs",
    "mutable_key_type",
    "suspicious_arithmetic_impl",
    "suspicious_assignment_formatting",
    "suspicious_else_formatting",
    "suspicious_map",
    "suspicious_unary_op_formatting",
];

const PERF_LINTS: &[&str] = &[
    "box_collection",
    "large_enum_variant",
    "needless_collect",
    "redundant_clone",
    "slow_vector_initialization",
    "unnecessary_to_owned",
];

const COMPLEXITY_LINTS: &[&str] = &[
    "needless_lifetimes",
    "redundant_closure",
    "too_many_arguments",
    "type_complexity",
];

pub struct ClippyAdapter {
    command: BoundCommand,
}

impl ClippyAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new("cargo", &["clippy", "--message-format=json", "--quiet"]),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::Rust,
            tool_category: "rust_static_analysis",
            default_confidence: Confidence::Medium,
            map: map_issue,
        }
    }

    async fn run_inner(
        &self,
        runner: &SandboxedRunner,
        project_root: &Path,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisOutput, AdapterError> {
        let root = project::locate_root(project_root, &["Cargo.toml"])?;
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let mut args = Vec::new();
        if options.include_tests {
            args.push("--all-targets".to_string());
        }
        let timeout = options.timeout();
        let spec = self.command.spec(args, root.clone(), timeout);
        let outcome = runner.run(&spec).await.map_err(|e| map_exec_err(TOOL, e))?;
        let outcome = require_within_timeout(TOOL, timeout, outcome)?;

        let stdout = String::from_utf8_lossy(&outcome.stdout);
        let (raw_issues, mut warnings) = match parse_output(&stdout) {
            Ok(parsed) => parsed,
            Err(_) if outcome.exit_code.unwrap_or(-1) != 0 => {
                return Err(AdapterError::NonZeroExit {
                    tool: TOOL,
                    code: outcome.exit_code.unwrap_or(-1),
                });
            }
            Err(err) => return Err(err),
        };

        let mut config = DiscoverConfig::for_extensions(["rs"]);
        config.max_files = options.max_files;
        let found = discover(&root, &config)?;
        warnings.extend(found.warnings);

        let issues = normalize(
            &Self::profile(),
            &root,
            probe.version.as_deref(),
            raw_issues,
            &mut warnings,
        );
        Ok(AnalysisOutput {
            issues: options.apply_filters(issues),
            files_analyzed: found.files.len(),
            warnings,
            tool_version: probe.version,
        })
    }
}

impl Default for ClippyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for ClippyAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::Rust
    }

    fn tool_category(&self) -> &'static str {
        "rust_static_analysis"
    }

    async fn probe(&self, runner: &SandboxedRunner) -> ProbeResult {
        self.command.probe_version(runner, VERSION_ARGS).await
    }

    async fn analyze(
        &self,
        runner: &SandboxedRunner,
        project_root: &Path,
        options: &AnalyzeOptions,
    ) -> ToolReport {
        let started_at = Utc::now();
        let result = self.run_inner(runner, project_root, options).await;
        finish_report(TOOL, project_root, started_at, result)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supported_languages: vec![Language::Rust],
            supported_formats: vec!["json"],
            requires_build: true,
            supports_incremental: true,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["rustup component add clippy"],
            requirements: vec!["Rust toolchain via rustup"],
            notes: "clippy builds the crate; the first run pays full compilation cost.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CargoLine {
    reason: String,
    #[serde(default)]
    message: Option<CompilerMessage>,
}

#[derive(Debug, Deserialize)]
struct CompilerMessage {
    level: String,
    message: String,
    #[serde(default)]
    code: Option<DiagnosticCode>,
    #[serde(default)]
    spans: Vec<DiagnosticSpan>,
    #[serde(default)]
    children: Vec<CompilerMessage>,
}

#[derive(Debug, Deserialize)]
struct DiagnosticCode {
    code: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DiagnosticSpan {
    file_name: String,
    line_start: u32,
    line_end: u32,
    column_start: u32,
    column_end: u32,
    is_primary: bool,
    #[serde(default)]
    suggested_replacement: Option<String>,
}

fn parse_output(stdout: &str) -> Result<(Vec<RawIssue>, Vec<String>), AdapterError> {
    let mut warnings = Vec::new();
    let mut raw_issues = Vec::new();
    let mut parsed_lines = 0usize;
    let mut total_lines = 0usize;

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        total_lines += 1;
        let record: CargoLine = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(_) => continue,
        };
        parsed_lines += 1;
        if record.reason != "compiler-message" {
            continue;
        }
        let Some(message) = record.message else {
            continue;
        };
        if !matches!(message.level.as_str(), "warning" | "error") {
            continue;
        }
        // Summary records ("N warnings emitted") have no code and no span.
        let Some(code) = &message.code else { continue };
        let Some(span) = primary_span(&message.spans) else {
            warnings.push(format!("{TOOL}: dropped {} without a span", code.code));
            continue;
        };

        let fix = suggestion_for(&message);
        raw_issues.push(RawIssue {
            file: span.file_name.clone(),
            line: span.line_start,
            column: span.column_start,
            end_line: Some(span.line_end),
            end_column: Some(span.column_end),
            rule: Some(code.code.clone()),
            title: message.message.clone(),
            description: message.message.clone(),
            native_severity: message.level.clone(),
            native_category: None,
            confidence: None,
            fix,
            refs: None,
        });
    }

    if parsed_lines == 0 && total_lines > 0 {
        return Err(AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: "no JSON records in cargo output".to_string(),
        });
    }
    Ok((raw_issues, warnings))
}

fn primary_span(spans: &[DiagnosticSpan]) -> Option<&DiagnosticSpan> {
    spans.iter().find(|s| s.is_primary).or_else(|| spans.first())
}

/// Machine-applicable replacements live on the child diagnostics.
fn suggestion_for(message: &CompilerMessage) -> Option<FixSuggestion> {
    message
        .spans
        .iter()
        .chain(message.children.iter().flat_map(|c| c.spans.iter()))
        .find_map(|span| {
            let replacement = span.suggested_replacement.clone()?;
            Some(FixSuggestion {
                replacement,
                start_line: span.line_start,
                start_column: span.column_start,
                end_line: span.line_end,
                end_column: span.column_end,
            })
        })
}

fn map_issue(raw: &RawIssue) -> Mapping {
    if raw.native_severity == "error" {
        return Mapping {
            severity: Severity::High,
            category: Category::Correctness,
            confidence: Some(Confidence::High),
            unknown_label: false,
            orig_label: None,
        };
    }

    let rule = raw.rule.as_deref().unwrap_or("");
    let lint = rule.strip_prefix("clippy::").unwrap_or(rule);
    // Correctness lints carry high confidence even at warning level.
    let (severity, category, confidence) = if CORRECTNESS_LINTS.contains(&lint) {
        (Severity::High, Category::Correctness, Some(Confidence::High))
    } else if SUSPICIOUS_LINTS.contains(&lint) {
        (Severity::Medium, Category::Suspicious, None)
    } else if PERF_LINTS.contains(&lint) {
        (Severity::Medium, Category::Performance, None)
    } else if COMPLEXITY_LINTS.contains(&lint) {
        (Severity::Low, Category::Complexity, None)
    } else if lint == "dead_code" || lint.starts_with("unused") {
        (Severity::Low, Category::Unused, None)
    } else {
        (Severity::Low, Category::Style, None)
    };
    Mapping {
        severity,
        category,
        confidence,
        unknown_label: false,
        orig_label: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_line(level: &str, code: &str, message: &str, replacement: Option<&str>) -> String {
        let replacement = match replacement {
            Some(r) => format!(r#""{r}""#),
            None => "null".to_string(),
        };
        format!(
            r#"{{"reason":"compiler-message","message":{{"level":"{level}","message":"{message}","code":{{"code":"{code}","explanation":null}},"spans":[{{"file_name":"src/lib.rs","line_start":3,"line_end":3,"column_start":9,"column_end":16,"is_primary":true,"suggested_replacement":{replacement}}}],"children":[]}}}}"#
        )
    }

    #[test]
    fn skips_non_message_records() {
        let stdout = format!(
            "{}\n{}\n{}",
            r#"{"reason":"compiler-artifact","target":{"name":"demo"}}"#,
            message_line("warning", "clippy::eq_op", "equal expressions", None),
            r#"{"reason":"build-finished","success":true}"#
        );
        let (raw, warnings) = parse_output(&stdout).unwrap();
        assert_eq!(raw.len(), 1);
        assert!(warnings.is_empty());
        assert_eq!(raw[0].rule.as_deref(), Some("clippy::eq_op"));
        assert_eq!(raw[0].line, 3);
        assert_eq!(raw[0].column, 9);
    }

    #[test]
    fn correctness_lint_maps_high() {
        let stdout = message_line("warning", "clippy::eq_op", "equal expressions", None);
        let (raw, mut warnings) = parse_output(&stdout).unwrap();
        let issues = normalize(
            &ClippyAdapter::profile(),
            Path::new("/work/crate"),
            Some("clippy 0.1.83"),
            raw,
            &mut warnings,
        );
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].category, Category::Correctness);
        assert_eq!(issues[0].confidence, Confidence::High);
        assert!(issues[0].cross_tool_patterns.contains("logical-error"));
    }

    #[test]
    fn unknown_lint_defaults_to_style() {
        let stdout = message_line("warning", "clippy::single_char_pattern", "use a char", None);
        let (raw, _) = parse_output(&stdout).unwrap();
        let mapping = map_issue(&raw[0]);
        assert_eq!(mapping.severity, Severity::Low);
        assert_eq!(mapping.category, Category::Style);
    }

    #[test]
    fn compile_error_maps_high_correctness() {
        let stdout = message_line("error", "E0308", "mismatched types", None);
        let (raw, _) = parse_output(&stdout).unwrap();
        let mapping = map_issue(&raw[0]);
        assert_eq!(mapping.severity, Severity::High);
        assert_eq!(mapping.category, Category::Correctness);
        assert_eq!(mapping.confidence, Some(Confidence::High));
    }

    #[test]
    fn suggested_replacement_becomes_fix() {
        let stdout = message_line(
            "warning",
            "clippy::redundant_clone",
            "redundant clone",
            Some("value"),
        );
        let (raw, _) = parse_output(&stdout).unwrap();
        let fix = raw[0].fix.as_ref().unwrap();
        assert_eq!(fix.replacement, "value");
        assert_eq!(fix.start_line, 3);
    }

    #[test]
    fn unwrap_lints_tag_panic_path() {
        let stdout = message_line("warning", "clippy::unwrap_used", "used unwrap", None);
        let (raw, mut warnings) = parse_output(&stdout).unwrap();
        let issues = normalize(
            &ClippyAdapter::profile(),
            Path::new("/work/crate"),
            None,
            raw,
            &mut warnings,
        );
        assert!(issues[0].cross_tool_patterns.contains("panic-path"));
    }

    #[test]
    fn non_json_output_is_unparseable() {
        let err = parse_output("error: could not compile").unwrap_err();
        assert!(err.to_string().starts_with("UnparseableOutput"));
    }
}
