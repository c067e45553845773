//! The adapter contract every tool integration satisfies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crosscheck_core::{CommandSpec, Language, SandboxedRunner, ToolReport};

use crate::options::AnalyzeOptions;

/// Cheap availability probe result. Cached by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn available(version: Option<String>) -> Self {
        Self {
            available: true,
            version,
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            version: None,
            error: Some(error.into()),
        }
    }
}

/// Purely declarative adapter capabilities; no I/O.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub supported_languages: Vec<Language>,
    pub supported_formats: Vec<&'static str>,
    pub requires_build: bool,
    pub supports_incremental: bool,
}

/// Static installation guidance for a missing tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallHint {
    pub steps: Vec<&'static str>,
    pub requirements: Vec<&'static str>,
    pub notes: &'static str,
}

/// One external analyzer behind the uniform contract.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Stable tool identifier (e.g. `"gosec"`, `"clang-static-analyzer"`).
    fn name(&self) -> &'static str;

    /// The language this adapter targets.
    fn language(&self) -> Language;

    /// Adapter family tag attached to correlation hints
    /// (e.g. `"rust_static_analysis"`).
    fn tool_category(&self) -> &'static str;

    /// Cheap, non-destructive availability check.
    async fn probe(&self, runner: &SandboxedRunner) -> ProbeResult;

    /// Run the tool against `project_root` and produce a report. Never
    /// returns an error: failures become a report with `status = error`
    /// and an empty issue list.
    async fn analyze(
        &self,
        runner: &SandboxedRunner,
        project_root: &Path,
        options: &AnalyzeOptions,
    ) -> ToolReport;

    fn capabilities(&self) -> Capabilities;

    fn install_hint(&self) -> InstallHint;
}

/// Per-adapter execution policy: the only route from an adapter to the
/// process runner. Fixes the program name and the argv prefix so an
/// adapter cannot drift into invoking arbitrary commands.
#[derive(Debug, Clone)]
pub struct BoundCommand {
    program: &'static str,
    prefix: &'static [&'static str],
}

impl BoundCommand {
    pub const fn new(program: &'static str, prefix: &'static [&'static str]) -> Self {
        Self { program, prefix }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Build a [`CommandSpec`] from the fixed prefix plus validated args.
    pub fn spec(&self, args: Vec<String>, cwd: PathBuf, timeout: Duration) -> CommandSpec {
        let mut argv: Vec<String> = self.prefix.iter().map(|s| s.to_string()).collect();
        argv.extend(args);
        CommandSpec::new(self.program, argv, cwd, timeout)
    }

    /// Probe by running `version_args` as the full argv; parses the first
    /// output line into a version string. The bound analysis prefix is not
    /// applied, version flags rarely share it.
    pub async fn probe_version(
        &self,
        runner: &SandboxedRunner,
        version_args: &[&str],
    ) -> ProbeResult {
        let spec = CommandSpec::new(
            self.program,
            version_args.iter().map(|s| s.to_string()).collect(),
            std::env::temp_dir(),
            Duration::from_secs(5),
        );
        match runner.run(&spec).await {
            Ok(outcome) if outcome.exit_code == Some(0) && !outcome.timed_out => {
                let stdout = String::from_utf8_lossy(&outcome.stdout).to_string();
                let stderr = String::from_utf8_lossy(&outcome.stderr).to_string();
                // Some tools print the version on stderr.
                let version = first_nonempty_line(&stdout).or_else(|| first_nonempty_line(&stderr));
                ProbeResult::available(version)
            }
            Ok(outcome) if outcome.timed_out => ProbeResult::unavailable("probe timed out"),
            Ok(outcome) => ProbeResult::unavailable(format!(
                "probe exited with {:?}",
                outcome.exit_code
            )),
            Err(err) => ProbeResult::unavailable(err.to_string()),
        }
    }
}

/// What a successful adapter run hands to the report builder.
#[derive(Debug, Default)]
pub struct AnalysisOutput {
    pub issues: Vec<crosscheck_core::UnifiedIssue>,
    pub files_analyzed: usize,
    pub warnings: Vec<String>,
    pub tool_version: Option<String>,
}

/// Wrap an adapter's inner result into a report, timing included. A
/// failed run always produces an error report with empty issues.
pub fn finish_report(
    tool: &'static str,
    target: &Path,
    started_at: chrono::DateTime<chrono::Utc>,
    result: Result<AnalysisOutput, crosscheck_core::AdapterError>,
) -> ToolReport {
    let finished_at = chrono::Utc::now();
    let target = target.display().to_string();
    match result {
        Ok(output) => {
            tracing::info!(
                tool,
                issues = output.issues.len(),
                files = output.files_analyzed,
                "adapter run complete"
            );
            ToolReport::success(
                tool,
                output.tool_version,
                target,
                output.issues,
                output.files_analyzed,
                output.warnings,
                started_at,
                finished_at,
            )
        }
        Err(err) => {
            tracing::warn!(tool, error = %err, "adapter run failed");
            ToolReport::failure(tool, None, target, &err, started_at, finished_at)
        }
    }
}

/// Map runner errors into the adapter taxonomy. A spawn failure caused by
/// a missing binary is `ToolUnavailable`, not an execution error.
pub fn map_exec_err(
    tool: &'static str,
    err: crosscheck_core::ExecError,
) -> crosscheck_core::AdapterError {
    use crosscheck_core::{AdapterError, ExecError};
    match err {
        ExecError::SpawnFailed { ref source, .. }
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            AdapterError::ToolUnavailable { tool }
        }
        ExecError::OutputOverflow { stream, .. } => AdapterError::OutputOverflow { tool, stream },
        other => AdapterError::Exec(other),
    }
}

/// Reject a timed-out outcome with the adapter taxonomy error.
pub fn require_within_timeout(
    tool: &'static str,
    timeout: Duration,
    outcome: crosscheck_core::ExecOutcome,
) -> Result<crosscheck_core::ExecOutcome, crosscheck_core::AdapterError> {
    if outcome.timed_out {
        return Err(crosscheck_core::AdapterError::Timeout {
            tool,
            limit: timeout,
        });
    }
    Ok(outcome)
}

fn first_nonempty_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::exec::cancellation_channel;

    #[test]
    fn bound_command_prepends_prefix() {
        let bound = BoundCommand::new("cargo", &["clippy", "--message-format=json"]);
        let spec = bound.spec(
            vec!["--quiet".into()],
            PathBuf::from("/p"),
            Duration::from_secs(1),
        );
        assert_eq!(spec.program, "cargo");
        assert_eq!(spec.args, vec!["clippy", "--message-format=json", "--quiet"]);
    }

    #[tokio::test]
    async fn probe_missing_tool_is_unavailable() {
        let (_tx, rx) = cancellation_channel();
        let runner = SandboxedRunner::new(rx);
        let bound = BoundCommand::new("definitely-not-a-real-tool-xyz", &[]);
        let probe = bound.probe_version(&runner, &["--version"]).await;
        assert!(!probe.available);
        assert!(probe.error.is_some());
    }

    #[tokio::test]
    async fn probe_parses_version_line() {
        let (_tx, rx) = cancellation_channel();
        let runner = SandboxedRunner::new(rx);
        // `echo` stands in for a tool that prints one version line.
        let bound = BoundCommand::new("echo", &[]);
        let probe = bound.probe_version(&runner, &["tool 1.2.3"]).await;
        assert!(probe.available);
        assert_eq!(probe.version.as_deref(), Some("tool 1.2.3"));
    }

    #[tokio::test]
    async fn probe_args_replace_the_bound_prefix() {
        let (_tx, rx) = cancellation_channel();
        let runner = SandboxedRunner::new(rx);
        // The analysis prefix would corrupt the version line if applied.
        let bound = BoundCommand::new("echo", &["--analyze"]);
        let probe = bound.probe_version(&runner, &["tool 4.5.6"]).await;
        assert!(probe.available);
        assert_eq!(probe.version.as_deref(), Some("tool 4.5.6"));
    }
}
