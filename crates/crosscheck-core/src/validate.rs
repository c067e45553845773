//! Canonical path validation.
//!
//! Every path derived from user input passes through [`validate`] before it
//! reaches discovery or the process runner. All policy rules are evaluated;
//! the first failing rule is returned.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use crate::error::ValidateError;

/// Directory basenames excluded from traversal and rejected as inputs.
pub const DENY_DIRS: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Package managers / vendored deps
    "node_modules",
    "vendor",
    // Python
    "__pycache__",
    ".pytest_cache",
    ".venv",
    "venv",
    // Build outputs
    "dist",
    "build",
    "target",
    "bin",
    "obj",
    "coverage",
    // IDE/editor
    ".idea",
    ".vscode",
    // Scratch
    "logs",
    "tmp",
    "temp",
    ".cache",
];

/// Absolute prefixes that are never valid analysis targets.
const BLOCKED_PREFIXES: &[&str] = &["/proc", "/sys", "/dev", "/etc"];

/// What the validated path must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathKind {
    #[default]
    Any,
    File,
    Directory,
}

/// Validation policy. All rules are enforced; empty collections disable
/// the corresponding rule.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    pub check_exists: bool,
    /// Lowercase extensions; empty set admits any extension.
    pub allowed_extensions: BTreeSet<String>,
    pub max_file_bytes: u64,
    /// When set, the resolved path must stay under this root.
    pub project_root: Option<PathBuf>,
    pub expect: PathKind,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            check_exists: true,
            allowed_extensions: BTreeSet::new(),
            max_file_bytes: 10 * 1024 * 1024,
            project_root: None,
            expect: PathKind::Any,
        }
    }
}

/// A path that passed validation, in canonical absolute form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    pub canonical: PathBuf,
    pub size_bytes: u64,
}

/// Validate `path` against `policy`.
pub fn validate(path: &Path, policy: &PathPolicy) -> Result<ValidatedPath, ValidateError> {
    let display = path.display().to_string();

    // Lexical screens run before touching the filesystem.
    if display.contains('\0') {
        return Err(ValidateError::PathTraversal { path: display });
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ValidateError::PathTraversal { path: display });
    }

    let canonical = if policy.check_exists {
        match std::fs::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ValidateError::NotFound { path: display });
            }
            Err(err) => {
                return Err(ValidateError::Io {
                    path: display,
                    source: err,
                });
            }
        }
    } else {
        std::path::absolute(path).map_err(|err| ValidateError::Io {
            path: display.clone(),
            source: err,
        })?
    };

    for prefix in BLOCKED_PREFIXES {
        if canonical.starts_with(prefix) {
            return Err(ValidateError::BlockedPath { path: display });
        }
    }

    // Symlinks were followed by canonicalize; the resolved target must
    // still sit under the declared root, and the portion below the root
    // must not pass through a denylisted directory.
    if let Some(root) = &policy.project_root {
        let root = std::fs::canonicalize(root).map_err(|err| ValidateError::Io {
            path: root.display().to_string(),
            source: err,
        })?;
        let relative = canonical.strip_prefix(&root).map_err(|_| {
            ValidateError::EscapedRoot {
                path: display.clone(),
                root: root.display().to_string(),
            }
        })?;
        if relative.components().any(|c| {
            matches!(c, Component::Normal(name)
                if DENY_DIRS.contains(&name.to_string_lossy().as_ref()))
        }) {
            return Err(ValidateError::BlockedPath { path: display });
        }
    }

    let metadata = if policy.check_exists {
        Some(std::fs::metadata(&canonical).map_err(|err| ValidateError::Io {
            path: display.clone(),
            source: err,
        })?)
    } else {
        None
    };

    if let Some(meta) = &metadata {
        match policy.expect {
            PathKind::File if !meta.is_file() => {
                return Err(ValidateError::WrongKind {
                    path: display,
                    expected: "file",
                });
            }
            PathKind::Directory if !meta.is_dir() => {
                return Err(ValidateError::WrongKind {
                    path: display,
                    expected: "directory",
                });
            }
            _ => {}
        }
    }

    let is_file = metadata.as_ref().map(|m| m.is_file()).unwrap_or(false);

    if is_file && !policy.allowed_extensions.is_empty() {
        let ext = canonical
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext {
            Some(ext) if policy.allowed_extensions.contains(&ext) => {}
            _ => return Err(ValidateError::DisallowedExtension { path: display }),
        }
    }

    let size_bytes = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
    if is_file && size_bytes > policy.max_file_bytes {
        return Err(ValidateError::FileTooLarge {
            path: display,
            size_bytes,
            limit_bytes: policy.max_file_bytes,
        });
    }

    Ok(ValidatedPath {
        canonical,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn file_policy() -> PathPolicy {
        PathPolicy {
            expect: PathKind::File,
            ..PathPolicy::default()
        }
    }

    #[test]
    fn rejects_parent_components() {
        let err = validate(Path::new("../etc/passwd"), &PathPolicy::default()).unwrap_err();
        assert!(matches!(err, ValidateError::PathTraversal { .. }));
    }

    #[test]
    fn rejects_nul_bytes() {
        let err = validate(Path::new("a\0b"), &PathPolicy::default()).unwrap_err();
        assert!(matches!(err, ValidateError::PathTraversal { .. }));
    }

    #[test]
    fn rejects_blocked_prefixes() {
        let err = validate(Path::new("/proc/self/environ"), &PathPolicy::default()).unwrap_err();
        // Either blocked outright or absent on exotic systems; both deny.
        assert!(matches!(
            err,
            ValidateError::BlockedPath { .. } | ValidateError::NotFound { .. }
        ));
    }

    #[test]
    fn rejects_denylisted_components() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("node_modules");
        fs::create_dir(&inner).unwrap();
        let file = inner.join("x.js");
        fs::write(&file, "x").unwrap();
        let policy = PathPolicy {
            project_root: Some(dir.path().to_path_buf()),
            ..file_policy()
        };
        let err = validate(&file, &policy).unwrap_err();
        assert!(matches!(err, ValidateError::BlockedPath { .. }));
    }

    #[test]
    fn admits_file_exactly_at_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("exact.rs");
        fs::write(&file, vec![b'x'; 64]).unwrap();
        let policy = PathPolicy {
            max_file_bytes: 64,
            ..file_policy()
        };
        let validated = validate(&file, &policy).unwrap();
        assert_eq!(validated.size_bytes, 64);
    }

    #[test]
    fn rejects_file_one_byte_over_cap() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("over.rs");
        fs::write(&file, vec![b'x'; 65]).unwrap();
        let policy = PathPolicy {
            max_file_bytes: 64,
            ..file_policy()
        };
        let err = validate(&file, &policy).unwrap_err();
        assert!(matches!(err, ValidateError::FileTooLarge { .. }));
    }

    #[test]
    fn enforces_extension_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("script.sh");
        fs::write(&file, "echo").unwrap();
        let policy = PathPolicy {
            allowed_extensions: BTreeSet::from(["rs".to_string()]),
            ..file_policy()
        };
        let err = validate(&file, &policy).unwrap_err();
        assert!(matches!(err, ValidateError::DisallowedExtension { .. }));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("MAIN.C");
        fs::write(&file, "int x;").unwrap();
        let policy = PathPolicy {
            allowed_extensions: BTreeSet::from(["c".to_string()]),
            ..file_policy()
        };
        assert!(validate(&file, &policy).is_ok());
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate(&dir.path().join("absent.rs"), &PathPolicy::default()).unwrap_err();
        assert!(matches!(err, ValidateError::NotFound { .. }));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy {
            expect: PathKind::File,
            ..PathPolicy::default()
        };
        let err = validate(dir.path(), &policy).unwrap_err();
        assert!(matches!(err, ValidateError::WrongKind { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.rs");
        fs::write(&secret, "x").unwrap();
        let link = root.path().join("link.rs");
        std::os::unix::fs::symlink(&secret, &link).unwrap();

        let policy = PathPolicy {
            project_root: Some(root.path().to_path_buf()),
            ..file_policy()
        };
        let err = validate(&link, &policy).unwrap_err();
        assert!(matches!(err, ValidateError::EscapedRoot { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_accepted() {
        let root = tempfile::tempdir().unwrap();
        let real = root.path().join("real.rs");
        fs::write(&real, "x").unwrap();
        let link = root.path().join("alias.rs");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let policy = PathPolicy {
            project_root: Some(root.path().to_path_buf()),
            ..file_policy()
        };
        assert!(validate(&link, &policy).is_ok());
    }
}
