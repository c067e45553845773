//! staticcheck adapter: Go correctness and simplification checks.
//!
//! `staticcheck -f json ./...` emits one JSON object per line. The check
//! code prefix carries the class: SA for bugs, S for simplifications, ST
//! for style, U for unused.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crosscheck_core::{
    discover, AdapterError, Category, Confidence, DiscoverConfig, Language, SandboxedRunner,
    Severity, ToolReport,
};

use crate::adapter::{
    finish_report, map_exec_err, require_within_timeout, AnalysisOutput, BoundCommand,
    Capabilities, InstallHint, ProbeResult, ToolAdapter,
};
use crate::normalize::{normalize, Mapping, RawIssue, ToolProfile};
use crate::options::AnalyzeOptions;
use crate::project;

const TOOL: &str = "staticcheck";
const VERSION_ARGS: &[&str] = &["-version"];

pub struct StaticcheckAdapter {
    command: BoundCommand,
}

impl StaticcheckAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new("staticcheck", &["-f", "json"]),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::Go,
            tool_category: "go_static_analysis",
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

        let mut config = DiscoverConfig::for_extensions(["go"]);
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

impl Default for StaticcheckAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for StaticcheckAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::Go
    }

    fn tool_category(&self) -> &'static str {
        "go_static_analysis"
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
            requires_build: true,
            supports_incremental: true,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["go install honnef.co/go/tools/cmd/staticcheck@latest"],
            requirements: vec!["Go toolchain matching the module's go directive"],
            notes: "staticcheck type-checks the module, so dependencies must resolve.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckRecord {
    code: String,
    severity: String,
    location: Location,
    #[serde(default)]
    end: Option<Location>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Location {
    file: String,
    line: u32,
    column: u32,
}

fn parse_output(stdout: &str) -> Result<(Vec<RawIssue>, Vec<String>), AdapterError> {
    let warnings = Vec::new();
    let mut raw_issues = Vec::new();
    let mut parsed_lines = 0usize;
    let mut total_lines = 0usize;

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        total_lines += 1;
        let record: CheckRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(_) => continue,
        };
        parsed_lines += 1;
        // "ignored" records are matches suppressed by lint directives.
        if record.severity == "ignored" {
            continue;
        }
        raw_issues.push(RawIssue {
            file: record.location.file,
            line: record.location.line,
            column: record.location.column,
            end_line: record.end.as_ref().map(|e| e.line),
            end_column: record.end.as_ref().map(|e| e.column),
            rule: Some(record.code.clone()),
            title: record.message.clone(),
            description: record.message,
            native_severity: record.severity,
            native_category: None,
            confidence: None,
            fix: None,
            refs: None,
        });
    }

    if parsed_lines == 0 && total_lines > 0 {
        return Err(AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: "no JSON records in staticcheck output".to_string(),
        });
    }
    Ok((raw_issues, warnings))
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let rule = raw.rule.as_deref().unwrap_or("");
    let (severity, category, unknown) = if rule.starts_with("SA2") {
        // Concurrency checks.
        (Severity::High, Category::Correctness, false)
    } else if rule.starts_with("SA5") {
        (Severity::High, Category::Correctness, false)
    } else if rule.starts_with("SA6") {
        (Severity::Medium, Category::Performance, false)
    } else if rule.starts_with("SA") {
        (Severity::Medium, Category::Correctness, false)
    } else if rule.starts_with("S1") || rule.starts_with("ST1") || rule.starts_with("QF1") {
        (Severity::Low, Category::Style, false)
    } else if rule.starts_with("U1") {
        (Severity::Low, Category::Unused, false)
    } else {
        (Severity::Medium, Category::Other, true)
    };

    let severity = if raw.native_severity == "error" {
        severity.max(Severity::High)
    } else {
        severity
    };

    Mapping {
        severity,
        category,
        confidence: None,
        unknown_label: unknown,
        orig_label: unknown.then(|| rule.to_string()),
    }
}
