//! valgrind memcheck adapter.
//!
//! Unlike the source-level tools this one needs a built binary, passed
//! in through the `valgrindBinary` option; without one the adapter fails
//! fast instead of guessing what to execute. Findings come from the
//! memcheck XML stream, located at the first stack frame that carries
//! file and line.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;

use crosscheck_core::{
    validate, AdapterError, Category, Confidence, Language, PathKind, PathPolicy, SandboxedRunner,
    Severity, ToolReport,
};

use crate::adapter::{
    finish_report, map_exec_err, require_within_timeout, AnalysisOutput, BoundCommand,
    Capabilities, InstallHint, ProbeResult, ToolAdapter,
};
use crate::normalize::{normalize, Mapping, RawIssue, ToolProfile};
use crate::options::AnalyzeOptions;

const TOOL: &str = "valgrind";
const VERSION_ARGS: &[&str] = &["--version"];

pub struct ValgrindAdapter {
    command: BoundCommand,
}

impl ValgrindAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new(
                "valgrind",
                &[
                    "--tool=memcheck",
                    "--leak-check=full",
                    "--xml=yes",
                    "--xml-fd=2",
                    "--error-exitcode=0",
                ],
            ),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::C,
            tool_category: "c_dynamic_analysis",
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
        let Some(binary) = &options.valgrind_binary else {
            // Nothing to execute without a target binary.
            return Err(AdapterError::ProjectNotFound {
                marker: "valgrindBinary",
                root: project_root.display().to_string(),
            });
        };
        let policy = PathPolicy {
            expect: PathKind::File,
            max_file_bytes: u64::MAX,
            ..PathPolicy::default()
        };
        let target = validate(binary, &policy)?;
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let timeout = options.timeout();
        let spec = self.command.spec(
            vec![target.canonical.display().to_string()],
            project_root.to_path_buf(),
            timeout,
        );
        let outcome = runner.run(&spec).await.map_err(|e| map_exec_err(TOOL, e))?;
        let outcome = require_within_timeout(TOOL, timeout, outcome)?;

        // --xml-fd=2 routes the report to stderr, away from the target
        // program's own stdout.
        let stderr = String::from_utf8_lossy(&outcome.stderr);
        let mut warnings = Vec::new();
        let raw_issues = match parse_output(&stderr, &target.canonical, &mut warnings) {
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
            project_root,
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

impl Default for ValgrindAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for ValgrindAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::C
    }

    fn tool_category(&self) -> &'static str {
        "c_dynamic_analysis"
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
            supported_languages: vec![Language::C, Language::Cpp],
            supported_formats: vec!["xml"],
            requires_build: true,
            supports_incremental: false,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec!["apt install valgrind"],
            requirements: vec![
                "Linux or macOS x86_64/aarch64",
                "target binary built with debug info (-g)",
            ],
            notes: "Pass the binary to analyze via the valgrindBinary option.",
        }
    }
}

#[derive(Debug, Default)]
struct ErrorRecord {
    kind: String,
    what: String,
    frames: Vec<Frame>,
}

#[derive(Debug, Default, Clone)]
struct Frame {
    func: Option<String>,
    dir: Option<String>,
    file: Option<String>,
    line: Option<u32>,
}

fn unparseable(detail: impl Into<String>) -> AdapterError {
    AdapterError::UnparseableOutput {
        tool: TOOL,
        detail: detail.into(),
    }
}

/// Streaming read of the memcheck XML: only `<error>` subtrees matter,
/// everything else in the protocol is skipped.
fn parse_errors(xml: &str) -> Result<Vec<ErrorRecord>, AdapterError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<ErrorRecord> = None;
    let mut frame: Option<Frame> = None;
    let mut in_xwhat = false;
    let mut tag: Vec<u8> = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"valgrindoutput" => saw_root = true,
                    b"error" => current = Some(ErrorRecord::default()),
                    b"frame" => {
                        if current.is_some() {
                            frame = Some(Frame::default());
                        }
                    }
                    b"xwhat" => in_xwhat = true,
                    _ => {}
                }
                tag = name;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|err| unparseable(err.to_string()))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(f) = frame.as_mut() {
                    match tag.as_slice() {
                        b"fn" => f.func = Some(text.to_string()),
                        b"dir" => f.dir = Some(text.to_string()),
                        b"file" => f.file = Some(text.to_string()),
                        b"line" => f.line = text.parse().ok(),
                        _ => {}
                    }
                } else if let Some(record) = current.as_mut() {
                    match tag.as_slice() {
                        b"kind" => record.kind = text.to_string(),
                        b"what" => record.what = text.to_string(),
                        b"text" if in_xwhat => record.what = text.to_string(),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"error" => {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                }
                b"frame" => {
                    if let (Some(record), Some(f)) = (current.as_mut(), frame.take()) {
                        record.frames.push(f);
                    }
                }
                b"xwhat" => in_xwhat = false,
                _ => tag.clear(),
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(unparseable(err.to_string())),
        }
    }

    if !saw_root {
        return Err(unparseable("no <valgrindoutput> root"));
    }
    Ok(records)
}

fn parse_output(
    xml: &str,
    binary: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<RawIssue>, AdapterError> {
    let records = parse_errors(xml)?;
    let binary_display = binary.display().to_string();

    let mut raw_issues = Vec::with_capacity(records.len());
    for record in records {
        let located = record
            .frames
            .iter()
            .find(|f| f.file.is_some() && f.line.is_some());
        let (file, line) = match located {
            Some(f) => {
                let name = f.file.clone().unwrap_or_default();
                let file = match &f.dir {
                    Some(dir) => format!("{dir}/{name}"),
                    None => name,
                };
                (file, f.line.unwrap_or(1))
            }
            None => {
                // Stripped binaries give stacks with no source refs; pin
                // the finding to the binary itself.
                warnings.push(format!(
                    "{TOOL}: {} without source location pinned to binary",
                    record.kind
                ));
                (binary_display.clone(), 1)
            }
        };
        let func = record
            .frames
            .first()
            .and_then(|f| f.func.clone())
            .unwrap_or_else(|| "??".to_string());

        raw_issues.push(RawIssue {
            file,
            line,
            column: 1,
            end_line: None,
            end_column: None,
            rule: Some(record.kind.clone()),
            title: record.what.clone(),
            description: format!("{} in {func}", record.what),
            native_severity: record.kind.to_ascii_lowercase(),
            native_category: None,
            confidence: None,
            fix: None,
            refs: None,
        });
    }
    Ok(raw_issues)
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let kind = raw.rule.as_deref().unwrap_or("");
    let (severity, unknown) = match kind {
        "InvalidRead" | "InvalidWrite" | "InvalidFree" | "MismatchedFree" | "InvalidJump" => {
            (Severity::High, false)
        }
        "Leak_DefinitelyLost" => (Severity::High, false),
        "Leak_IndirectlyLost" | "Leak_PossiblyLost" => (Severity::Medium, false),
        "Leak_StillReachable" => (Severity::Low, false),
        "UninitValue" | "UninitCondition" => (Severity::Medium, false),
        "Overlap" | "SyscallParam" | "ClientCheck" => (Severity::Medium, false),
        _ => (Severity::Medium, true),
    };
    Mapping {
        severity,
        category: Category::MemorySafety,
        confidence: None,
        unknown_label: unknown,
        orig_label: unknown.then(|| kind.to_string()),
    }
}
