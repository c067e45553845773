//! mypy adapter: Python type checking.
//!
//! mypy has no structured output mode worth using, so the line-oriented
//! `path:line:col: level: message [code]` form is parsed with a regex.
//! Note lines carry no finding of their own; they extend the description
//! of the preceding error.

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use crosscheck_core::{
    AdapterError, Category, Confidence, Language, SandboxedRunner, Severity, ToolReport,
};

use crate::adapter::{
    finish_report, map_exec_err, require_within_timeout, AnalysisOutput, BoundCommand,
    Capabilities, InstallHint, ProbeResult, ToolAdapter,
};
use crate::normalize::{normalize, Mapping, RawIssue, ToolProfile};
use crate::options::AnalyzeOptions;
use crate::project;

const TOOL: &str = "mypy";
const VERSION_ARGS: &[&str] = &["--version"];

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<path>[^:\s][^:]*):(?P<line>\d+)(?::(?P<col>\d+))?: (?P<level>error|warning|note): (?P<msg>.*)$",
        )
        .unwrap_or_else(|_| unreachable!("pattern is a constant"))
    })
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\s+\[(?P<code>[a-z][a-z0-9-]*)\]$")
            .unwrap_or_else(|_| unreachable!("pattern is a constant"))
    })
}

pub struct MypyAdapter {
    command: BoundCommand,
}

impl MypyAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new(
                "mypy",
                &[
                    "--no-error-summary",
                    "--show-column-numbers",
                    "--show-error-codes",
                    "--no-color-output",
                ],
            ),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::Python,
            tool_category: "python_type_analysis",
            default_confidence: Confidence::High,
            map: map_issue,
        }
    }

    async fn run_inner(
        &self,
        runner: &SandboxedRunner,
        project_root: &Path,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisOutput, AdapterError> {
        let root = project::locate_root_by_extensions(project_root, &["py"], "*.py")?;
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let timeout = options.timeout();
        let mut spec = self
            .command
            .spec(vec![".".to_string()], root.clone(), timeout);
        // A stray MYPYPATH would pull modules from outside the project.
        spec.env.push(("MYPYPATH".to_string(), String::new()));
        let outcome = runner.run(&spec).await.map_err(|e| map_exec_err(TOOL, e))?;
        let outcome = require_within_timeout(TOOL, timeout, outcome)?;

        let stdout = String::from_utf8_lossy(&outcome.stdout);
        let (raw_issues, files_analyzed, mut warnings) = match parse_output(&stdout) {
            Ok(parsed) => parsed,
            // Exit 2 is a usage or crash failure; exit 1 just means
            // findings were reported.
            Err(_) if outcome.exit_code.unwrap_or(-1) != 0 => {
                return Err(AdapterError::NonZeroExit {
                    tool: TOOL,
                    code: outcome.exit_code.unwrap_or(-1),
                });
            }
            Err(err) => return Err(err),
        };

        let issues = normalize(
            &Self::profile(),
            &root,
            probe.version.as_deref(),
            raw_issues,
            &mut warnings,
        );
        Ok(AnalysisOutput {
            issues: options.apply_filters(issues),
            files_analyzed,
            warnings,
            tool_version: probe.version,
        })
    }
}

impl Default for MypyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for MypyAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn tool_category(&self) -> &'static str {
        "python_type_analysis"
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
            supported_languages: vec![Language::Python],
            supported_formats: vec!["text"],
            requires_build: false,
            supports_incremental: true,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["pip install mypy"],
            requirements: vec!["Python 3.9+"],
            notes: "Stub packages (types-*) improve coverage for third-party imports.",
        }
    }
}

fn parse_output(stdout: &str) -> Result<(Vec<RawIssue>, usize, Vec<String>), AdapterError> {
    let mut warnings = Vec::new();
    let mut raw_issues: Vec<RawIssue> = Vec::new();
    let mut matched = 0usize;
    let mut total = 0usize;

    for line in stdout.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
        total += 1;
        let Some(caps) = line_pattern().captures(line) else {
            continue;
        };
        matched += 1;
        let level = &caps["level"];
        let msg = caps["msg"].to_string();
        if level == "note" {
            if let Some(previous) = raw_issues.last_mut() {
                previous.description.push('\n');
                previous.description.push_str(&msg);
            }
            continue;
        }

        let (msg, code) = match code_pattern().captures(&msg) {
            Some(code_caps) => {
                let code = code_caps["code"].to_string();
                let stripped = msg[..msg.len() - code_caps[0].len()].to_string();
                (stripped, Some(code))
            }
            None => (msg, None),
        };
        let line_no = caps["line"].parse().unwrap_or(1);
        let column = caps
            .name("col")
            .and_then(|c| c.as_str().parse().ok())
            .unwrap_or(1);
        raw_issues.push(RawIssue {
            file: caps["path"].to_string(),
            line: line_no,
            column,
            end_line: None,
            end_column: None,
            rule: code,
            title: msg.clone(),
            description: msg,
            native_severity: level.to_string(),
            native_category: None,
            confidence: None,
            fix: None,
            refs: None,
        });
    }

    if matched == 0 && total > 0 {
        return Err(AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: "no diagnostic lines matched".to_string(),
        });
    }
    if total > matched {
        warnings.push(format!("{TOOL}: skipped {} unmatched lines", total - matched));
    }

    let files_analyzed = raw_issues
        .iter()
        .map(|r| r.file.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    Ok((raw_issues, files_analyzed, warnings))
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let (severity, unknown_label) = match raw.native_severity.as_str() {
        "error" => (Severity::High, false),
        "warning" => (Severity::Medium, false),
        _ => (Severity::Medium, true),
    };
    Mapping {
        severity,
        category: Category::Type,
        confidence: None,
        unknown_label,
        orig_label: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
app/models.py:14:9: error: Incompatible types in assignment (expression has type \"str\", variable has type \"int\")  [assignment]
app/models.py:14:9: note: See https://mypy.readthedocs.io for details
app/views.py:3: error: Name \"render\" is not defined  [name-defined]
app/views.py:8:1: warning: Returning Any from function declared to return \"str\"  [no-any-return]
";

    #[test]
    fn parses_diagnostic_lines() {
        let (raw, files, warnings) = parse_output(FIXTURE).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(files, 2);
        assert!(warnings.is_empty());
        assert_eq!(raw[0].file, "app/models.py");
        assert_eq!(raw[0].line, 14);
        assert_eq!(raw[0].column, 9);
        assert_eq!(raw[0].rule.as_deref(), Some("assignment"));
        assert!(raw[0].title.starts_with("Incompatible types"));
        assert!(!raw[0].title.contains("[assignment]"));
    }

    #[test]
    fn note_lines_extend_previous_description() {
        let (raw, _, _) = parse_output(FIXTURE).unwrap();
        assert!(raw[0].description.contains("mypy.readthedocs.io"));
    }

    #[test]
    fn missing_column_defaults_to_one() {
        let (raw, _, _) = parse_output(FIXTURE).unwrap();
        assert_eq!(raw[1].rule.as_deref(), Some("name-defined"));
        assert_eq!(raw[1].column, 1);
    }

    #[test]
    fn errors_map_high_type() {
        let (raw, _, mut warnings) = parse_output(FIXTURE).unwrap();
        let issues = normalize(
            &MypyAdapter::profile(),
            Path::new("/work/app"),
            Some("mypy 1.11.0"),
            raw,
            &mut warnings,
        );
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].category, Category::Type);
        assert_eq!(issues[0].confidence, Confidence::High);
        assert!(issues[0].cross_tool_patterns.contains("type-error"));
    }

    #[test]
    fn warning_maps_medium() {
        let (raw, _, _) = parse_output(FIXTURE).unwrap();
        let mapping = map_issue(&raw[2]);
        assert_eq!(mapping.severity, Severity::Medium);
    }

    #[test]
    fn unmatched_lines_counted_as_warning() {
        let mixed = format!("{FIXTURE}some stray build output\n");
        let (_, _, warnings) = parse_output(&mixed).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("skipped 1"));
    }

    #[test]
    fn pure_garbage_is_unparseable() {
        let err = parse_output("Traceback (most recent call last):\n  boom\n").unwrap_err();
        assert!(err.to_string().starts_with("UnparseableOutput"));
    }
}
