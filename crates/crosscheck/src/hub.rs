//! The orchestration hub: detect languages, probe tools, run the
//! eligible adapters in a bounded pool, and join their reports.
//!
//! Input validation failures abort the run before any tool starts.
//! Adapter failures never do; they surface as error reports alongside
//! their siblings' results.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::sync::Cache;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use crosscheck_adapters::{default_adapters, AnalyzeOptions, ProbeResult, ToolAdapter};
use crosscheck_core::{
    detect_languages, validate, AdapterError, ExecError, MultiToolReport, PathKind, PathPolicy,
    SandboxedRunner, ToolReport, ValidateError,
};

use crate::assemble;

/// Probe results go stale when tools are installed or upgraded; five
/// minutes keeps repeat runs cheap without pinning a dead answer.
const PROBE_TTL: Duration = Duration::from_secs(300);

/// Upper bound on concurrent adapters when the caller does not pin one.
const DEFAULT_MAX_PARALLELISM: usize = 4;

pub struct AnalysisHub {
    adapters: Vec<Arc<dyn ToolAdapter>>,
    probes: Cache<&'static str, ProbeResult>,
    cancel: watch::Sender<bool>,
}

enum Slot {
    Ready(ToolReport),
    Running(&'static str, JoinHandle<ToolReport>),
}

impl AnalysisHub {
    /// Hub over the full shipped adapter set.
    pub fn new() -> Self {
        Self::with_adapters(default_adapters())
    }

    pub fn with_adapters(adapters: Vec<Arc<dyn ToolAdapter>>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            adapters,
            probes: Cache::builder().time_to_live(PROBE_TTL).build(),
            cancel,
        }
    }

    /// Signal every in-flight runner to stop. Adapters observe this as a
    /// cancelled execution and report it like any other failure.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Run all selected, eligible, available adapters against the
    /// project. Only input validation aborts the whole run.
    pub async fn analyze(
        &self,
        project_root: &Path,
        options: &AnalyzeOptions,
    ) -> Result<MultiToolReport, ValidateError> {
        let started_at = Utc::now();
        let policy = PathPolicy {
            expect: PathKind::Directory,
            max_file_bytes: u64::MAX,
            ..PathPolicy::default()
        };
        let root = validate(project_root, &policy)?.canonical;
        let languages = detect_languages(&root)?;
        let detected: Vec<_> = languages.iter().copied().collect();
        tracing::info!(root = %root.display(), languages = ?detected, "analysis started");

        if languages.is_empty() {
            return Ok(assemble::assemble(&root, detected, Vec::new(), started_at));
        }

        let semaphore = Arc::new(Semaphore::new(effective_parallelism(options)));
        let mut slots = Vec::new();
        for adapter in &self.adapters {
            let name = adapter.name();
            if !options.tool_selected(name) {
                continue;
            }
            let capabilities = adapter.capabilities();
            if !capabilities
                .supported_languages
                .iter()
                .any(|language| languages.contains(language))
            {
                continue;
            }

            let probe = self.probe_cached(adapter.as_ref()).await;
            if !probe.available {
                tracing::debug!(tool = name, error = ?probe.error, "tool unavailable");
                let now = Utc::now();
                let err = AdapterError::ToolUnavailable { tool: name };
                slots.push(Slot::Ready(ToolReport::failure(
                    name,
                    probe.version,
                    root.display().to_string(),
                    &err,
                    now,
                    now,
                )));
                continue;
            }

            let adapter = Arc::clone(adapter);
            let runner = SandboxedRunner::new(self.cancel.subscribe());
            let task_root = root.clone();
            let task_options = options.clone();
            let semaphore = Arc::clone(&semaphore);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                adapter.analyze(&runner, &task_root, &task_options).await
            });
            slots.push(Slot::Running(name, handle));
        }

        let mut reports = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Ready(report) => reports.push(report),
                Slot::Running(name, handle) => match handle.await {
                    Ok(report) => reports.push(report),
                    Err(join_err) => {
                        tracing::error!(tool = name, error = %join_err, "adapter task aborted");
                        let now = Utc::now();
                        let err = AdapterError::Exec(ExecError::CaptureFailed);
                        reports.push(ToolReport::failure(
                            name,
                            None,
                            root.display().to_string(),
                            &err,
                            now,
                            now,
                        ));
                    }
                },
            }
        }

        let multi = assemble::assemble(&root, detected, reports, started_at);
        tracing::info!(
            issues = multi.aggregate.total_issues,
            failed = multi.aggregate.failed_adapters,
            wall_ms = multi.wall_clock_ms,
            "analysis finished"
        );
        Ok(multi)
    }

    /// Probe through the TTL cache; each tool pays for at most one probe
    /// per window regardless of how many runs hit it.
    async fn probe_cached(&self, adapter: &dyn ToolAdapter) -> ProbeResult {
        let name = adapter.name();
        if let Some(hit) = self.probes.get(name) {
            return hit;
        }
        let runner = SandboxedRunner::new(self.cancel.subscribe());
        let result = adapter.probe(&runner).await;
        self.probes.insert(name, result.clone());
        result
    }
}

impl Default for AnalysisHub {
    fn default() -> Self {
        Self::new()
    }
}

fn effective_parallelism(options: &AnalyzeOptions) -> usize {
    if options.parallelism > 0 {
        return options.parallelism;
    }
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(DEFAULT_MAX_PARALLELISM)
}
