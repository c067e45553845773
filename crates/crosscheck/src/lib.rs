//! crosscheck: run multiple static analyzers over one project and merge
//! their findings into a single normalized report.
//!
//! The typical entry point is [`AnalysisHub`]; [`analyze`] wraps it for
//! one-shot callers:
//!
//! ```no_run
//! # async fn demo() -> Result<(), crosscheck::ValidateError> {
//! let options = crosscheck::AnalyzeOptions::default();
//! let report = crosscheck::analyze(std::path::Path::new("."), &options).await?;
//! println!("{}", report.to_json().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub mod assemble;
pub mod hub;

pub use crosscheck_adapters::{default_adapters, AnalyzeOptions, ProbeResult, ToolAdapter};
pub use crosscheck_core::{
    AdapterError, AggregateCounts, Category, Confidence, Language, MultiToolReport, Severity,
    ToolReport, ToolStatus, UnifiedIssue, ValidateError,
};
pub use hub::AnalysisHub;

/// One-shot analysis over the full shipped adapter set.
pub async fn analyze(
    project_root: &Path,
    options: &AnalyzeOptions,
) -> Result<MultiToolReport, ValidateError> {
    AnalysisHub::new().analyze(project_root, options).await
}
