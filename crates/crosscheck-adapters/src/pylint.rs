//! pylint adapter: Python lint over discovered file batches.
//!
//! pylint takes explicit file lists, so discovery feeds it batches of
//! `batchSize` paths; each batch is a separate bounded run and the
//! results are concatenated in batch order. The message type letter
//! (fatal/error/warning/refactor/convention) drives the mapping.

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

const TOOL: &str = "pylint";
const VERSION_ARGS: &[&str] = &["--version"];

pub struct PylintAdapter {
    command: BoundCommand,
}

impl PylintAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new("pylint", &["--output-format=json", "--score=n"]),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::Python,
            tool_category: "python_static_analysis",
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
        let root = project::locate_root_by_extensions(project_root, &["py"], "*.py")?;
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let mut config = DiscoverConfig::for_extensions(["py"]);
        config.max_files = options.max_files;
        let found = discover(&root, &config)?;
        let mut warnings = found.warnings;
        let files: Vec<String> = found
            .files
            .iter()
            .map(|path| {
                path.strip_prefix(&root)
                    .unwrap_or(path)
                    .display()
                    .to_string()
            })
            .collect();

        let timeout = options.timeout();
        let batch_size = options.batch_size.max(1);
        let mut raw_issues = Vec::new();
        for batch in files.chunks(batch_size) {
            let spec = self.command.spec(batch.to_vec(), root.clone(), timeout);
            let outcome = runner.run(&spec).await.map_err(|e| map_exec_err(TOOL, e))?;
            let outcome = require_within_timeout(TOOL, timeout, outcome)?;

            let stdout = String::from_utf8_lossy(&outcome.stdout);
            let batch_issues = match parse_output(&stdout) {
                Ok(parsed) => parsed,
                // Bit 32 is a usage error: pylint itself failed to run.
                Err(_) if outcome.exit_code.unwrap_or(-1) & 32 != 0 => {
                    return Err(AdapterError::NonZeroExit {
                        tool: TOOL,
                        code: outcome.exit_code.unwrap_or(-1),
                    });
                }
                Err(err) => return Err(err),
            };
            raw_issues.extend(batch_issues);
        }

        let issues = normalize(
            &Self::profile(),
            &root,
            probe.version.as_deref(),
            raw_issues,
            &mut warnings,
        );
        Ok(AnalysisOutput {
            issues: options.apply_filters(issues),
            files_analyzed: files.len(),
            warnings,
            tool_version: probe.version,
        })
    }
}

impl Default for PylintAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for PylintAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn tool_category(&self) -> &'static str {
        "python_static_analysis"
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
            supported_formats: vec!["json"],
            requires_build: false,
            supports_incremental: true,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["pip install pylint"],
            requirements: vec!["Python 3.9+"],
            notes: "pylint resolves imports, so running inside the project venv is best.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PylintMessage {
    #[serde(rename = "type")]
    kind: String,
    line: u32,
    column: u32,
    #[serde(default, rename = "endLine")]
    end_line: Option<u32>,
    #[serde(default, rename = "endColumn")]
    end_column: Option<u32>,
    path: String,
    symbol: String,
    message: String,
    #[serde(rename = "message-id")]
    message_id: String,
}

fn parse_output(stdout: &str) -> Result<Vec<RawIssue>, AdapterError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        // A clean batch prints nothing under --score=n.
        return Ok(Vec::new());
    }
    let messages: Vec<PylintMessage> =
        serde_json::from_str(trimmed).map_err(|err| AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: err.to_string(),
        })?;

    Ok(messages
        .into_iter()
        .map(|msg| RawIssue {
            file: msg.path,
            line: msg.line,
            // pylint columns are zero-based.
            column: msg.column.saturating_add(1),
            end_line: msg.end_line,
            end_column: msg.end_column.map(|c| c.saturating_add(1)),
            rule: Some(msg.message_id.clone()),
            title: msg.message.clone(),
            description: format!("{} ({})", msg.message, msg.symbol),
            native_severity: msg.kind,
            native_category: Some(msg.symbol),
            confidence: None,
            fix: None,
            refs: None,
        })
        .collect())
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let mut unknown_label = false;
    let (severity, mut category) = match raw.native_severity.as_str() {
        "fatal" => (Severity::High, Category::Correctness),
        "error" => (Severity::High, Category::Correctness),
        "warning" => (Severity::Medium, Category::Suspicious),
        "refactor" => (Severity::Low, Category::Complexity),
        "convention" => (Severity::Low, Category::Style),
        "info" => (Severity::Info, Category::Other),
        _ => {
            unknown_label = true;
            (Severity::Medium, Category::Other)
        }
    };
    if let Some(symbol) = &raw.native_category {
        if symbol.contains("unused") {
            category = Category::Unused;
        }
    }
    Mapping {
        severity,
        category,
        confidence: None,
        unknown_label,
        orig_label: unknown_label.then(|| raw.native_severity.clone()),
    }
}
