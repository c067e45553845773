//! Error taxonomy for the harness.
//!
//! Three enums, one per concern: input validation, process execution, and
//! adapter-level failures. Input errors abort a run before any adapter
//! starts; everything else is confined to the adapter that raised it.

use std::time::Duration;

/// Input-validation failures. Raised by the path validator and file
/// discovery; any of these aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("PathTraversal: path contains parent components or NUL: {path}")]
    PathTraversal { path: String },

    #[error("EscapedRoot: {path} resolves outside project root {root}")]
    EscapedRoot { path: String, root: String },

    #[error("DisallowedExtension: {path}")]
    DisallowedExtension { path: String },

    #[error("FileTooLarge: {path} is {size_bytes} bytes (limit {limit_bytes})")]
    FileTooLarge {
        path: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("BlockedPath: {path}")]
    BlockedPath { path: String },

    #[error("NotFound: {path}")]
    NotFound { path: String },

    #[error("WrongKind: expected a {expected}: {path}")]
    WrongKind {
        path: String,
        expected: &'static str,
    },

    #[error("AggregateBudget: {total_bytes} bytes admitted exceeds {limit_bytes}")]
    AggregateBudget { total_bytes: u64, limit_bytes: u64 },

    #[error("Io: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Process-runner failures. A timed-out child is not an error at this
/// level: the runner reports `timed_out = true` and the adapter decides.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("ProcessSpawnFailed: {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ForbiddenArgument: shell metacharacters in argument: {arg}")]
    ForbiddenArgument { arg: String },

    #[error("OutputOverflow: {stream} exceeded capture cap of {cap_bytes} bytes")]
    OutputOverflow {
        stream: &'static str,
        cap_bytes: usize,
    },

    #[error("Cancelled: run cancelled before child exit")]
    Cancelled,

    #[error("CaptureFailed: output capture task aborted")]
    CaptureFailed,

    #[error("Io: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter-level failures. Every variant maps to a report with
/// `status = error` and an empty issue list; none of them aborts siblings.
///
/// Display strings start with the taxonomy kind so a report `error` field
/// is machine-matchable by prefix.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("ProjectNotFound: no {marker} at or above {root}")]
    ProjectNotFound { marker: &'static str, root: String },

    #[error("ToolUnavailable: {tool} not found on PATH")]
    ToolUnavailable { tool: &'static str },

    #[error("ToolVersionUnsupported: {tool} {version}")]
    ToolVersionUnsupported { tool: &'static str, version: String },

    #[error("Timeout: {tool} exceeded {}ms", limit.as_millis())]
    Timeout { tool: &'static str, limit: Duration },

    #[error("OutputOverflow: {tool} exceeded the {stream} capture cap")]
    OutputOverflow {
        tool: &'static str,
        stream: &'static str,
    },

    #[error("NonZeroExitWithoutParseableOutput: {tool} exited {code} with no parseable output")]
    NonZeroExit { tool: &'static str, code: i32 },

    #[error("UnparseableOutput: {tool}: {detail}")]
    UnparseableOutput { tool: &'static str, detail: String },

    #[error("UnknownOption: {detail}")]
    UnknownOption { detail: String },

    #[error("ProcessSpawnFailed: {0}")]
    Exec(#[from] ExecError),

    #[error("{0}")]
    Validation(#[from] ValidateError),
}

impl AdapterError {
    /// Stable taxonomy kind, independent of the formatted message.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::ProjectNotFound { .. } => "ProjectNotFound",
            AdapterError::ToolUnavailable { .. } => "ToolUnavailable",
            AdapterError::ToolVersionUnsupported { .. } => "ToolVersionUnsupported",
            AdapterError::Timeout { .. } => "Timeout",
            AdapterError::OutputOverflow { .. } => "OutputOverflow",
            AdapterError::NonZeroExit { .. } => "NonZeroExitWithoutParseableOutput",
            AdapterError::UnparseableOutput { .. } => "UnparseableOutput",
            AdapterError::UnknownOption { .. } => "UnknownOption",
            AdapterError::Exec(_) => "ProcessSpawnFailed",
            AdapterError::Validation(_) => "InvalidInput",
        }
    }
}
