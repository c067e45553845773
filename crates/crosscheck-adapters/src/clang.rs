//! clang static analyzer adapter for C and C++ sources.
//!
//! Sources are discovered and analyzed in batches; each batch writes
//! plist output into a scratch directory which is parsed afterwards. The
//! plist format is a small closed grammar (dict/array/string/integer),
//! read here with a streaming quick-xml loop instead of a full plist
//! crate.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;

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

const TOOL: &str = "clang-static-analyzer";
const VERSION_ARGS: &[&str] = &["--version"];
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

pub struct ClangAnalyzerAdapter {
    command: BoundCommand,
}

impl ClangAnalyzerAdapter {
    pub fn new() -> Self {
        Self {
            command: BoundCommand::new(
                "clang",
                &["--analyze", "--analyzer-output", "plist-multi-file"],
            ),
        }
    }

    fn profile() -> ToolProfile {
        ToolProfile {
            tool: TOOL,
            language: Language::C,
            tool_category: "c_static_analysis",
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
        let root =
            project::locate_root_by_extensions(project_root, SOURCE_EXTENSIONS, "*.c/*.cpp")?;
        let probe = self.command.probe_version(runner, VERSION_ARGS).await;
        if !probe.available {
            return Err(AdapterError::ToolUnavailable { tool: TOOL });
        }

        let mut config = DiscoverConfig::for_extensions(SOURCE_EXTENSIONS.iter().copied());
        config.max_files = options.max_files;
        let found = discover(&root, &config)?;
        let mut warnings = found.warnings;
        let files: Vec<String> = found
            .files
            .iter()
            .map(|path| path.display().to_string())
            .collect();

        let timeout = options.timeout();
        let batch_size = options.batch_size.max(1);
        let mut raw_issues = Vec::new();
        for batch in files.chunks(batch_size) {
            let scratch = tempfile::tempdir().map_err(|err| {
                AdapterError::Exec(crosscheck_core::ExecError::Io(err))
            })?;
            let mut args = vec!["-o".to_string(), scratch.path().display().to_string()];
            args.extend(batch.iter().cloned());
            let spec = self.command.spec(args, root.clone(), timeout);
            let outcome = runner.run(&spec).await.map_err(|e| map_exec_err(TOOL, e))?;
            let outcome = require_within_timeout(TOOL, timeout, outcome)?;

            let plists = read_scratch_plists(scratch.path())?;
            if plists.is_empty() && outcome.exit_code.unwrap_or(-1) != 0 {
                return Err(AdapterError::NonZeroExit {
                    tool: TOOL,
                    code: outcome.exit_code.unwrap_or(-1),
                });
            }
            for plist in &plists {
                raw_issues.extend(parse_plist_report(plist, &mut warnings)?);
            }
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

impl Default for ClangAnalyzerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for ClangAnalyzerAdapter {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn language(&self) -> Language {
        Language::C
    }

    fn tool_category(&self) -> &'static str {
        "c_static_analysis"
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
            supported_formats: vec!["plist"],
            requires_build: false,
            supports_incremental: true,
        }
    }

    fn install_hint(&self) -> InstallHint {
        InstallHint {
            steps: vec![
                "apt install clang  # Debian/Ubuntu",
                "brew install llvm  # macOS",
            ],
            requirements: vec!["clang 14+"],
            notes: "Headers outside the project need include flags; plain C translation units work out of the box.",
        }
    }
}

fn read_scratch_plists(scratch: &Path) -> Result<Vec<String>, AdapterError> {
    let mut plists = Vec::new();
    let entries = std::fs::read_dir(scratch).map_err(|err| {
        AdapterError::Exec(crosscheck_core::ExecError::Io(err))
    })?;
    for entry in entries {
        let entry = entry.map_err(|err| AdapterError::Exec(crosscheck_core::ExecError::Io(err)))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("plist") {
            let content = std::fs::read_to_string(&path)
                .map_err(|err| AdapterError::Exec(crosscheck_core::ExecError::Io(err)))?;
            plists.push(content);
        }
    }
    plists.sort();
    Ok(plists)
}

/// The subset of plist values the analyzer output uses.
#[derive(Debug, Clone, PartialEq)]
enum PlistValue {
    String(String),
    Int(i64),
    Bool(bool),
    Array(Vec<PlistValue>),
    Dict(BTreeMap<String, PlistValue>),
}

impl PlistValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            PlistValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn get(&self, key: &str) -> Option<&PlistValue> {
        match self {
            PlistValue::Dict(map) => map.get(key),
            _ => None,
        }
    }

    fn items(&self) -> &[PlistValue] {
        match self {
            PlistValue::Array(items) => items,
            _ => &[],
        }
    }
}

enum Container {
    Array(Vec<PlistValue>),
    Dict(BTreeMap<String, PlistValue>, Option<String>),
}

fn unparseable(detail: impl Into<String>) -> AdapterError {
    AdapterError::UnparseableOutput {
        tool: TOOL,
        detail: detail.into(),
    }
}

/// Streaming plist reader: containers go on a stack, scalars attach to
/// the container on top.
fn parse_plist(xml: &str) -> Result<PlistValue, AdapterError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Container> = Vec::new();
    let mut root: Option<PlistValue> = None;
    let mut scalar_tag: Option<Vec<u8>> = None;
    let mut scalar_text = String::new();

    fn attach(
        stack: &mut Vec<Container>,
        root: &mut Option<PlistValue>,
        value: PlistValue,
    ) -> Result<(), AdapterError> {
        match stack.last_mut() {
            Some(Container::Array(items)) => items.push(value),
            Some(Container::Dict(map, pending)) => match pending.take() {
                Some(key) => {
                    map.insert(key, value);
                }
                None => match value {
                    PlistValue::String(key) => *pending = Some(key),
                    _ => return Err(unparseable("dict value without a key")),
                },
            },
            None => *root = Some(value),
        }
        Ok(())
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"plist" => {}
                b"dict" => stack.push(Container::Dict(BTreeMap::new(), None)),
                b"array" => stack.push(Container::Array(Vec::new())),
                tag @ (b"key" | b"string" | b"integer" | b"real") => {
                    scalar_tag = Some(tag.to_vec());
                    scalar_text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if scalar_tag.is_some() {
                    let text = t
                        .unescape()
                        .map_err(|err| unparseable(err.to_string()))?;
                    scalar_text.push_str(&text);
                }
            }
            Ok(Event::Empty(e)) => {
                let value = match e.name().as_ref() {
                    b"true" => Some(PlistValue::Bool(true)),
                    b"false" => Some(PlistValue::Bool(false)),
                    b"dict" => Some(PlistValue::Dict(BTreeMap::new())),
                    b"array" => Some(PlistValue::Array(Vec::new())),
                    b"string" | b"key" => Some(PlistValue::String(String::new())),
                    _ => None,
                };
                if let Some(value) = value {
                    attach(&mut stack, &mut root, value)?;
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"dict" => match stack.pop() {
                    Some(Container::Dict(map, None)) => {
                        attach(&mut stack, &mut root, PlistValue::Dict(map))?
                    }
                    _ => return Err(unparseable("unbalanced dict")),
                },
                b"array" => match stack.pop() {
                    Some(Container::Array(items)) => {
                        attach(&mut stack, &mut root, PlistValue::Array(items))?
                    }
                    _ => return Err(unparseable("unbalanced array")),
                },
                b"key" | b"string" | b"integer" | b"real" => {
                    if scalar_tag.take().is_some() {
                        let value = if e.name().as_ref() == b"integer" {
                            PlistValue::Int(
                                scalar_text
                                    .trim()
                                    .parse()
                                    .map_err(|_| unparseable("bad integer"))?,
                            )
                        } else if e.name().as_ref() == b"real" {
                            PlistValue::Int(
                                scalar_text
                                    .trim()
                                    .parse::<f64>()
                                    .map_err(|_| unparseable("bad real"))?
                                    as i64,
                            )
                        } else {
                            PlistValue::String(std::mem::take(&mut scalar_text))
                        };
                        attach(&mut stack, &mut root, value)?;
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(unparseable(err.to_string())),
        }
    }

    root.ok_or_else(|| unparseable("empty plist"))
}

/// Pull diagnostics out of one parsed plist document.
fn parse_plist_report(
    xml: &str,
    warnings: &mut Vec<String>,
) -> Result<Vec<RawIssue>, AdapterError> {
    let root = parse_plist(xml)?;
    let files: Vec<&str> = root
        .get("files")
        .map(|f| f.items().iter().filter_map(PlistValue::as_str).collect())
        .unwrap_or_default();

    let mut raw_issues = Vec::new();
    for diag in root
        .get("diagnostics")
        .map(PlistValue::items)
        .unwrap_or_default()
    {
        let description = diag
            .get("description")
            .and_then(PlistValue::as_str)
            .unwrap_or("")
            .to_string();
        let category = diag
            .get("category")
            .and_then(PlistValue::as_str)
            .unwrap_or("")
            .to_string();
        let check = diag
            .get("check_name")
            .and_then(PlistValue::as_str)
            .map(str::to_string);
        let Some(location) = diag.get("location") else {
            warnings.push(format!("{TOOL}: diagnostic without location dropped"));
            continue;
        };
        let line = location.get("line").and_then(PlistValue::as_int).unwrap_or(1) as u32;
        let column = location.get("col").and_then(PlistValue::as_int).unwrap_or(1) as u32;
        let file_index = location.get("file").and_then(PlistValue::as_int).unwrap_or(-1);
        let Some(file) = usize::try_from(file_index)
            .ok()
            .and_then(|i| files.get(i).copied())
        else {
            warnings.push(format!(
                "{TOOL}: diagnostic with file index {file_index} out of range dropped"
            ));
            continue;
        };

        raw_issues.push(RawIssue {
            file: file.to_string(),
            line,
            column,
            end_line: None,
            end_column: None,
            rule: check,
            title: description.clone(),
            description,
            native_severity: category.to_ascii_lowercase(),
            native_category: Some(category),
            confidence: None,
            fix: None,
            refs: None,
        });
    }
    Ok(raw_issues)
}

fn map_issue(raw: &RawIssue) -> Mapping {
    let category_label = raw.native_category.as_deref().unwrap_or("");
    let check = raw.rule.as_deref().unwrap_or("");
    let (severity, category, unknown) =
        if category_label.eq_ignore_ascii_case("security") || check.starts_with("security.") {
            (Severity::High, Category::Security, false)
        } else if category_label.eq_ignore_ascii_case("memory error") {
            (Severity::High, Category::MemorySafety, false)
        } else if category_label.eq_ignore_ascii_case("logic error") {
            (Severity::Medium, Category::Correctness, false)
        } else if category_label.eq_ignore_ascii_case("dead code") {
            (Severity::Low, Category::DeadCode, false)
        } else if category_label.eq_ignore_ascii_case("api") {
            (Severity::Medium, Category::Suspicious, false)
        } else {
            (Severity::Medium, Category::Other, true)
        };
    Mapping {
        severity,
        category,
        confidence: None,
        unknown_label: unknown,
        orig_label: (!category_label.is_empty() && unknown)
            .then(|| category_label.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
 <key>clang_version</key>
 <string>clang version 17.0.6</string>
 <key>files</key>
 <array>
  <string>/work/proj/src/alloc.c</string>
  <string>/work/proj/src/util.c</string>
 </array>
 <key>diagnostics</key>
 <array>
  <dict>
   <key>description</key>
   <string>Potential leak of memory pointed to by 'buf'</string>
   <key>category</key>
   <string>Memory error</string>
   <key>type</key>
   <string>Memory leak</string>
   <key>check_name</key>
   <string>unix.Malloc</string>
   <key>location</key>
   <dict>
    <key>line</key>
    <integer>42</integer>
    <key>col</key>
    <integer>5</integer>
    <key>file</key>
    <integer>0</integer>
   </dict>
  </dict>
  <dict>
   <key>description</key>
   <string>Value stored to 'n' is never read</string>
   <key>category</key>
   <string>Dead code</string>
   <key>type</key>
   <string>Dead assignment</string>
   <key>check_name</key>
   <string>deadcode.DeadStores</string>
   <key>location</key>
   <dict>
    <key>line</key>
    <integer>7</integer>
    <key>col</key>
    <integer>3</integer>
    <key>file</key>
    <integer>1</integer>
   </dict>
  </dict>
 </array>
</dict>
</plist>"#;

    #[test]
    fn parses_multi_file_plist() {
        let mut warnings = Vec::new();
        let raw = parse_plist_report(FIXTURE, &mut warnings).unwrap();
        assert_eq!(raw.len(), 2);
        assert!(warnings.is_empty());
        assert_eq!(raw[0].file, "/work/proj/src/alloc.c");
        assert_eq!(raw[0].line, 42);
        assert_eq!(raw[0].rule.as_deref(), Some("unix.Malloc"));
        assert_eq!(raw[1].file, "/work/proj/src/util.c");
    }

    #[test]
    fn memory_error_normalizes_high() {
        let mut warnings = Vec::new();
        let raw = parse_plist_report(FIXTURE, &mut warnings).unwrap();
        let issues = normalize(
            &ClangAnalyzerAdapter::profile(),
            Path::new("/work/proj"),
            Some("clang version 17.0.6"),
            raw,
            &mut warnings,
        );
        let leak = &issues[0];
        assert_eq!(leak.canonical_path, "src/alloc.c");
        assert_eq!(leak.severity, Severity::High);
        assert_eq!(leak.category, Category::MemorySafety);
        assert!(leak.cross_tool_patterns.contains("memory-error"));
    }

    #[test]
    fn dead_code_normalizes_low() {
        let mut warnings = Vec::new();
        let raw = parse_plist_report(FIXTURE, &mut warnings).unwrap();
        let mapping = map_issue(&raw[1]);
        assert_eq!(mapping.severity, Severity::Low);
        assert_eq!(mapping.category, Category::DeadCode);
    }

    #[test]
    fn out_of_range_file_index_is_dropped_with_warning() {
        let xml = FIXTURE.replace("<integer>1</integer>", "<integer>9</integer>");
        let mut warnings = Vec::new();
        let raw = parse_plist_report(&xml, &mut warnings).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("out of range"));
    }

    #[test]
    fn unknown_category_defaults_medium() {
        let raw = RawIssue {
            native_category: Some("Exotic category".to_string()),
            native_severity: "exotic category".to_string(),
            rule: Some("custom.Check".to_string()),
            ..RawIssue::default()
        };
        let mapping = map_issue(&raw);
        assert!(mapping.unknown_label);
        assert_eq!(mapping.severity, Severity::Medium);
        assert_eq!(mapping.orig_label.as_deref(), Some("Exotic category"));
    }

    #[test]
    fn escaped_entities_survive() {
        let xml = r#"<plist><dict><key>files</key><array><string>a &amp; b.c</string></array><key>diagnostics</key><array/></dict></plist>"#;
        let root = parse_plist(xml).unwrap();
        assert_eq!(
            root.get("files").unwrap().items()[0].as_str(),
            Some("a & b.c")
        );
    }

    #[test]
    fn truncated_plist_is_unparseable() {
        let err = parse_plist("<plist><dict><key>files</key>").unwrap_err();
        assert!(err.to_string().starts_with("UnparseableOutput"));
    }
}
