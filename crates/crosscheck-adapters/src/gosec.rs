//! gosec adapter: Go source security scanner.
//!
//! Runs `gosec -fmt=json ./...` from the module root and maps the G-rule
//! families onto the unified schema. gosec exits non-zero when it finds
//! issues, so the exit code alone is never treated as a failure.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crosscheck_core::{
    AdapterError, Category, Confidence, ExternalRefs, Language, SandboxedRunner, Severity,
    ToolReport,
};

use crate::adapter::{
    finish_report, map_exec_err, require_within_timeout, AnalysisOutput, BoundCommand,
    Capabilities, InstallHint, ProbeResult, ToolAdapter,
};
use crate::normalize::{normalize, Mapping, RawIssue, ToolProfile};
use crate::options::AnalyzeOptions;
use crate::project;

const TOOL: &str = "gosec";
const VERSION_ARGS: &[&str] = &["-version"];

pub struct GosecAdapter {
    command: BoundCommand,
}

impl GosecAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new("gosec", &["-fmt=json", "-quiet"]),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::Go,
            tool_category: "go_security_analysis",
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
        let root = project::locate_root(project_root, &["go.mod"])?;
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let timeout = options.timeout();
        let spec = self
            .command
            .spec(vec!["./...".to_string()], root.clone(), timeout);
        let outcome = runner.run(&spec).await.map_err(|e| map_exec_err(TOOL, e))?;
        let outcome = require_within_timeout(TOOL, timeout, outcome)?;

        let stdout = String::from_utf8_lossy(&outcome.stdout);
        let (raw_issues, files_analyzed, mut warnings) = match parse_output(&stdout) {
            Ok(parsed) => parsed,
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

impl Default for GosecAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for GosecAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::Go
    }

    fn tool_category(&self) -> &'static str {
        "go_security_analysis"
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
            supported_languages: vec![Language::Go],
            supported_formats: vec!["json"],
            requires_build: false,
            supports_incremental: false,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["go install github.com/securego/gosec/v2/cmd/gosec@latest"],
            requirements: vec!["Go toolchain 1.20+"],
            notes: "gosec must be on PATH; it scans packages from the go.mod root.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GosecOutput {
    #[serde(rename = "Issues", default)]
    issues: Vec<GosecIssue>,
    #[serde(rename = "Stats", default)]
    stats: Option<GosecStats>,
}

#[derive(Debug, Deserialize)]
struct GosecIssue {
    severity: String,
    confidence: String,
    rule_id: String,
    details: String,
    file: String,
    line: String,
    column: String,
    #[serde(default)]
    cwe: Option<GosecCwe>,
}

#[derive(Debug, Deserialize)]
struct GosecCwe {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct GosecStats {
    #[serde(default)]
    files: usize,
}

fn parse_output(stdout: &str) -> Result<(Vec<RawIssue>, usize, Vec<String>), AdapterError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: "empty stdout".to_string(),
        });
    }
    let output: GosecOutput =
        serde_json::from_str(trimmed).map_err(|err| AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: err.to_string(),
        })?;

    let mut warnings = Vec::new();
    let mut raw_issues = Vec::with_capacity(output.issues.len());
    for issue in output.issues {
        let (line, end_line) = parse_line_range(&issue.line);
        let column = issue.column.parse::<u32>().unwrap_or(1);
        let refs = issue.cwe.map(|cwe| ExternalRefs {
            cwe: Some(format!("CWE-{}", cwe.id)),
            owasp: None,
            advisory_url: cwe.url,
        });
        raw_issues.push(RawIssue {
            file: issue.file,
            line,
            column,
            end_line,
            end_column: None,
            rule: Some(issue.rule_id.clone()),
            title: issue.details.clone(),
            description: issue.details,
            native_severity: issue.severity.to_ascii_lowercase(),
            native_category: None,
            confidence: parse_confidence(&issue.confidence, &mut warnings),
            fix: None,
            refs,
        });
    }
    let files = output.stats.unwrap_or_default().files;
    Ok((raw_issues, files, warnings))
}

/// gosec emits `"5"` or a `"5-7"` range in the line field.
fn parse_line_range(field: &str) -> (u32, Option<u32>) {
    match field.split_once('-') {
        Some((start, end)) => (
            start.trim().parse().unwrap_or(1),
            end.trim().parse::<u32>().ok(),
        ),
        None => (field.trim().parse().unwrap_or(1), None),
    }
}

fn parse_confidence(label: &str, warnings: &mut Vec<String>) -> Option<Confidence> {
    match label.to_ascii_lowercase().as_str() {
        "high" => Some(Confidence::High),
        "medium" => Some(Confidence::Medium),
        "low" => Some(Confidence::Low),
        other => {
            warnings.push(format!("{TOOL}: unknown confidence label {other:?}"));
            None
        }
    }
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let mut unknown_label = false;
    let baseline = match raw.native_severity.as_str() {
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => {
            unknown_label = true;
            Severity::Medium
        }
    };
    let rule = raw.rule.as_deref().unwrap_or("");
    // Credential and injection rules are floored at high regardless of
    // what gosec labelled them.
    let mut severity = match rule {
        "G101" | "G201" | "G202" => baseline.max(Severity::High),
        _ => baseline,
    };
    // The one sanctioned demotion: a high finding gosec itself is not
    // confident about drops to medium.
    if severity == Severity::High && raw.confidence == Some(Confidence::Low) {
        severity = Severity::Medium;
    }
    Mapping {
        severity,
        category: Category::Security,
        confidence: None,
        unknown_label,
        orig_label: None,
    }
}
