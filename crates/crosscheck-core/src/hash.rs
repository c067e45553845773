//! Deterministic issue ids and correlation keys.
//!
//! Ids are the first 16 hex chars of a SHA-256 over the identity fields;
//! correlation keys are the full 128-bit xxh3 rendered as 32 hex chars.
//! Both are pure functions of their inputs so reruns on identical trees
//! produce identical values on any machine.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_128;

/// Stable issue id over `(canonicalPath, startLine, ruleCode, tool)`.
pub fn issue_id(canonical_path: &str, start_line: u32, rule_code: &str, tool: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_path.as_bytes());
    hasher.update(b"|");
    hasher.update(start_line.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(rule_code.as_bytes());
    hasher.update(b"|");
    hasher.update(tool.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

/// 128-bit correlation key over `(canonicalPath, startLine, category, tool)`.
///
/// Distinct from [`issue_id`]: it hashes the mapped category rather than the
/// tool-native rule code, so differently-named rules that land in the same
/// category at the same location collide on purpose.
pub fn correlation_key(canonical_path: &str, start_line: u32, category: &str, tool: &str) -> String {
    let joined = format!("{canonical_path}|{start_line}|{category}|{tool}");
    format!("{:032x}", xxh3_128(joined.as_bytes()))
}
