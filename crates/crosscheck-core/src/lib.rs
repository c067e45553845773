//! crosscheck-core: primitives for the multi-tool analysis harness
//!
//! This crate provides the pieces every adapter and the orchestrator build on:
//! - Validate: canonical path validation with traversal/denylist enforcement
//! - Discover: bounded file discovery with extension filters
//! - Exec: sandboxed external process execution with timeouts and capture caps
//! - Lang: marker-based language detection
//! - Issue/Report: the unified issue schema and per-tool report types
//! - Hash: deterministic issue ids and correlation keys

pub mod discover;
pub mod error;
pub mod exec;
pub mod hash;
pub mod issue;
pub mod lang;
pub mod report;
pub mod validate;

// Re-exports for convenience
pub use discover::{discover, Discovery, DiscoverConfig};
pub use error::{AdapterError, ExecError, ValidateError};
pub use exec::{CommandSpec, ExecOutcome, SandboxedRunner};
pub use hash::{correlation_key, issue_id};
pub use issue::{
    Category, Confidence, CorrelationHints, ExternalRefs, FixSuggestion, SearchRadius, Severity,
    UnifiedIssue,
};
pub use lang::{detect_languages, Language};
pub use report::{AggregateCounts, MultiToolReport, ToolReport, ToolStatus};
pub use validate::{validate, PathKind, PathPolicy, ValidatedPath, DENY_DIRS};
