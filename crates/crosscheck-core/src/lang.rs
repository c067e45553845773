//! Marker-based language detection.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ValidateError;
use crate::validate::DENY_DIRS;

/// Languages the harness dispatches adapters for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Go,
    C,
    Cpp,
    Python,
}

impl Language {
    /// Ecosystem tag stamped on every issue this language's adapters emit.
    pub fn ecosystem_tag(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Python => "python",
        }
    }

    /// Source-file extensions associated with this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Rust => &["rs"],
            Language::Go => &["go"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hxx", "hh"],
            Language::Python => &["py", "pyi"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "Rust",
            Language::Go => "Go",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Python => "Python",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Bounds for the extension-presence sweep. Marker files decide first;
// the walk only backstops C/C++/Python trees without manifests.
const DETECT_MAX_DEPTH: usize = 8;
const DETECT_MAX_ENTRIES: usize = 4096;

/// Detect the set of supported languages present under `root`.
///
/// The empty set is a valid outcome ("no supported languages"), not an
/// error.
pub fn detect_languages(root: &Path) -> Result<BTreeSet<Language>, ValidateError> {
    let mut detected = BTreeSet::new();

    if root.join("Cargo.toml").is_file() {
        detected.insert(Language::Rust);
    }
    if root.join("go.mod").is_file() {
        detected.insert(Language::Go);
    }
    if root.join("requirements.txt").is_file() || root.join("pyproject.toml").is_file() {
        detected.insert(Language::Python);
    }

    let mut seen = 0usize;
    let walker = WalkDir::new(root)
        .max_depth(DETECT_MAX_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let is_root = entry.depth() == 0;
            is_root || (!name.starts_with('.') && !DENY_DIRS.contains(&name.as_ref()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Unreadable subtrees do not block detection elsewhere.
            Err(_) => continue,
        };
        seen += 1;
        if seen > DETECT_MAX_ENTRIES {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("c") => {
                detected.insert(Language::C);
            }
            Some("cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh") => {
                detected.insert(Language::Cpp);
            }
            Some("py") => {
                detected.insert(Language::Python);
            }
            Some("go") => {
                detected.insert(Language::Go);
            }
            Some("rs") => {
                detected.insert(Language::Rust);
            }
            _ => {}
        }
    }

    tracing::debug!(
        root = %root.display(),
        languages = ?detected,
        "language detection complete"
    );
    Ok(detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn detects_rust_by_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let langs = detect_languages(dir.path()).unwrap();
        assert!(langs.contains(&Language::Rust));
    }

    #[test]
    fn detects_go_by_module_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/m").unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let langs = detect_languages(dir.path()).unwrap();
        assert_eq!(langs, BTreeSet::from([Language::Go]));
    }

    #[test]
    fn detects_c_and_python_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.c"), "int main(void){return 0;}").unwrap();
        fs::write(dir.path().join("tool.py"), "print('x')").unwrap();
        let langs = detect_languages(dir.path()).unwrap();
        assert!(langs.contains(&Language::C));
        assert!(langs.contains(&Language::Python));
    }

    #[test]
    fn empty_tree_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let langs = detect_languages(dir.path()).unwrap();
        assert!(langs.is_empty());
    }

    #[test]
    fn denylisted_dirs_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let vendored = dir.path().join("node_modules");
        fs::create_dir(&vendored).unwrap();
        fs::write(vendored.join("dep.py"), "x = 1").unwrap();
        let langs = detect_languages(dir.path()).unwrap();
        assert!(langs.is_empty());
    }
}
