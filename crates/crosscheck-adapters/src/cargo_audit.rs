//! cargo-audit adapter: RustSec advisory lookups against Cargo.lock.
//!
//! Every finding is a known vulnerability in a locked dependency, so the
//! whole report pins to `Cargo.lock` line 1 with the advisory id as the
//! rule code.

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

const TOOL: &str = "cargo-audit";
const VERSION_ARGS: &[&str] = &["audit", "--version"];

pub struct CargoAuditAdapter {
    command: BoundCommand,
}

impl CargoAuditAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new("cargo", &["audit", "--json"]),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::Rust,
            tool_category: "rust_dependency_audit",
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
        let root = project::locate_root(project_root, &["Cargo.toml"])?;
        // The audit reads the lockfile, not the manifest; without one
        // there is nothing to check.
        if !root.join("Cargo.lock").is_file() {
            return Err(AdapterError::ProjectNotFound {
                marker: "Cargo.lock",
                root: root.display().to_string(),
            });
        }
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let timeout = options.timeout();
        let spec = self.command.spec(Vec::new(), root.clone(), timeout);
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

        let issues = normalize(
            &Self::profile(),
            &root,
            probe.version.as_deref(),
            raw_issues,
            &mut warnings,
        );
        Ok(AnalysisOutput {
            issues: options.apply_filters(issues),
            files_analyzed: 1,
            warnings,
            tool_version: probe.version,
        })
    }
}

impl Default for CargoAuditAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for CargoAuditAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::Rust
    }

    fn tool_category(&self) -> &'static str {
        "rust_dependency_audit"
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
            requires_build: false,
            supports_incremental: false,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["cargo install cargo-audit --locked"],
            requirements: vec!["Rust toolchain", "a committed Cargo.lock"],
            notes: "Advisory data comes from the RustSec database; the first run fetches it.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuditOutput {
    #[serde(default)]
    vulnerabilities: Vulnerabilities,
}

#[derive(Debug, Deserialize, Default)]
struct Vulnerabilities {
    #[serde(default)]
    list: Vec<Vulnerability>,
}

#[derive(Debug, Deserialize)]
struct Vulnerability {
    advisory: Advisory,
    package: AdvisoryPackage,
    #[serde(default)]
    versions: Option<AdvisoryVersions>,
}

#[derive(Debug, Deserialize)]
struct Advisory {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    cvss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdvisoryPackage {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize, Default)]
struct AdvisoryVersions {
    #[serde(default)]
    patched: Vec<String>,
}

fn parse_output(stdout: &str) -> Result<(Vec<RawIssue>, Vec<String>), AdapterError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: "empty stdout".to_string(),
        });
    }
    let output: AuditOutput =
        serde_json::from_str(trimmed).map_err(|err| AdapterError::UnparseableOutput {
            tool: TOOL,
            detail: err.to_string(),
        })?;

    let warnings = Vec::new();
    let mut raw_issues = Vec::with_capacity(output.vulnerabilities.list.len());
    for vuln in output.vulnerabilities.list {
        let patched = vuln
            .versions
            .unwrap_or_default()
            .patched
            .join(", ");
        let mut description = vuln.advisory.description.clone();
        if !patched.is_empty() {
            description.push_str(&format!("\nPatched versions: {patched}"));
        }
        raw_issues.push(RawIssue {
            file: "Cargo.lock".to_string(),
            line: 1,
            column: 1,
            end_line: None,
            end_column: None,
            rule: Some(vuln.advisory.id.clone()),
            title: format!(
                "{} {}: {}",
                vuln.package.name, vuln.package.version, vuln.advisory.title
            ),
            description,
            native_severity: severity_label(vuln.advisory.cvss.as_deref()),
            native_category: None,
            confidence: None,
            fix: None,
            refs: Some(ExternalRefs {
                cwe: None,
                owasp: None,
                advisory_url: vuln.advisory.url,
            }),
        });
    }
    Ok((raw_issues, warnings))
}

/// CVSS vector strings are opaque here; presence of one keeps the default
/// high, absence falls back to medium.
fn severity_label(cvss: Option<&str>) -> String {
    match cvss {
        Some(v) if !v.is_empty() => "high".to_string(),
        _ => "medium".to_string(),
    }
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let severity = match raw.native_severity.as_str() {
        "high" => Severity::High,
        _ => Severity::Medium,
    };
    Mapping {
        severity,
        category: Category::Vulnerability,
        confidence: Some(Confidence::High),
        unknown_label: false,
        orig_label: None,
    }
}
