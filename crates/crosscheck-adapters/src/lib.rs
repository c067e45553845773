//! crosscheck-adapters: one adapter per external analyzer.
//!
//! Every adapter follows the same six-phase template: locate the project
//! marker, validate inputs, build a fixed argument vector, execute through
//! the sandboxed runner, parse the tool-native output, and normalize into
//! the unified issue schema. Failures are structured: an adapter that
//! errors reports an empty issue list, never partial data.

pub mod adapter;
pub mod cargo_audit;
pub mod clang;
pub mod clippy;
pub mod correlate;
pub mod gosec;
pub mod mypy;
pub mod normalize;
pub mod options;
pub mod project;
pub mod pylint;
pub mod staticcheck;
pub mod valgrind;

pub use adapter::{BoundCommand, Capabilities, InstallHint, ProbeResult, ToolAdapter};
pub use cargo_audit::CargoAuditAdapter;
pub use clang::ClangAnalyzerAdapter;
pub use clippy::ClippyAdapter;
pub use gosec::GosecAdapter;
pub use mypy::MypyAdapter;
pub use normalize::{normalize, Mapping, RawIssue, ToolProfile};
pub use options::AnalyzeOptions;
pub use pylint::PylintAdapter;
pub use staticcheck::StaticcheckAdapter;
pub use valgrind::ValgrindAdapter;

/// Every adapter the harness ships, in registration order.
pub fn default_adapters() -> Vec<std::sync::Arc<dyn ToolAdapter>> {
    vec![
        std::sync::Arc::new(ClangAnalyzerAdapter::new()),
        std::sync::Arc::new(ValgrindAdapter::new()),
        std::sync::Arc::new(CargoAuditAdapter::new()),
        std::sync::Arc::new(ClippyAdapter::new()),
        std::sync::Arc::new(GosecAdapter::new()),
        std::sync::Arc::new(StaticcheckAdapter::new()),
        std::sync::Arc::new(PylintAdapter::new()),
        std::sync::Arc::new(MypyAdapter::new()),
    ]
}
