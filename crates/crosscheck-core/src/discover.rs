//! Bounded file discovery.
//!
//! Depth-first walk under a project root with hard caps on depth, file
//! count, and aggregate bytes. Denylisted and dot-prefixed directories are
//! pruned; every admitted file passes the path validator.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ValidateError;
use crate::validate::{validate, PathKind, PathPolicy, DENY_DIRS};

/// Discovery bounds and filters.
#[derive(Debug, Clone)]
pub struct DiscoverConfig {
    /// Lowercase extensions to include.
    pub extensions: BTreeSet<String>,
    /// Hard cap on admitted files; traversal stops when reached.
    pub max_files: usize,
    /// Depth counted from root = 0.
    pub max_depth: usize,
    pub max_file_bytes: u64,
    /// Aggregate byte budget across admitted files.
    pub max_aggregate_bytes: u64,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            extensions: BTreeSet::new(),
            max_files: 1000,
            max_depth: 16,
            max_file_bytes: 10 * 1024 * 1024,
            max_aggregate_bytes: 256 * 1024 * 1024,
        }
    }
}

impl DiscoverConfig {
    pub fn for_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|s| s.into().to_ascii_lowercase())
                .collect(),
            ..Self::default()
        }
    }
}

/// Discovery outcome: admitted files in walk order plus resource notes.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub total_bytes: u64,
    pub warnings: Vec<String>,
    /// True when traversal stopped at `max_files`.
    pub hit_file_cap: bool,
}

/// Walk `root` and return every admissible file, in traversal order.
pub fn discover(root: &Path, config: &DiscoverConfig) -> Result<Discovery, ValidateError> {
    let root = validate(
        root,
        &PathPolicy {
            expect: PathKind::Directory,
            ..PathPolicy::default()
        },
    )?
    .canonical;

    let mut discovery = Discovery::default();
    let policy = PathPolicy {
        allowed_extensions: config.extensions.clone(),
        max_file_bytes: config.max_file_bytes,
        project_root: Some(root.clone()),
        expect: PathKind::File,
        ..PathPolicy::default()
    };

    let walker = WalkDir::new(&root)
        .max_depth(config.max_depth)
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
        if discovery.files.len() >= config.max_files {
            discovery.hit_file_cap = true;
            discovery
                .warnings
                .push(format!("FileLimit: stopped at {} files", config.max_files));
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                discovery.warnings.push(format!("unreadable entry: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext {
            Some(ext) if config.extensions.contains(&ext) => {}
            _ => continue,
        }

        // Files that fail validation are excluded, not fatal: the walk
        // already pruned denylisted dirs, so this catches size caps and
        // symlinks escaping the root.
        let validated = match validate(entry.path(), &policy) {
            Ok(validated) => validated,
            Err(err) => {
                discovery
                    .warnings
                    .push(format!("skipped {}: {err}", entry.path().display()));
                continue;
            }
        };

        if discovery.total_bytes + validated.size_bytes > config.max_aggregate_bytes {
            discovery.warnings.push(format!(
                "MemoryCap: aggregate byte budget {} reached",
                config.max_aggregate_bytes
            ));
            break;
        }
        discovery.total_bytes += validated.size_bytes;
        discovery.files.push(validated.canonical);
    }

    tracing::debug!(
        root = %root.display(),
        files = discovery.files.len(),
        bytes = discovery.total_bytes,
        capped = discovery.hit_file_cap,
        "discovery complete"
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, bytes: usize) {
        fs::write(path, vec![b'a'; bytes]).unwrap();
    }

    #[test]
    fn filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.go"), 4);
        touch(&dir.path().join("b.rs"), 4);
        touch(&dir.path().join("c.txt"), 4);

        let config = DiscoverConfig::for_extensions(["go"]);
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("a.go"));
    }

    #[test]
    fn skips_denylisted_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        touch(&dir.path().join("target/gen.rs"), 4);
        touch(&dir.path().join(".hidden/x.rs"), 4);
        touch(&dir.path().join("src/lib.rs"), 4);

        let config = DiscoverConfig::for_extensions(["rs"]);
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("src/lib.rs"));
    }

    #[test]
    fn file_cap_is_hard() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(&dir.path().join(format!("f{i}.py")), 4);
        }
        let config = DiscoverConfig {
            max_files: 3,
            ..DiscoverConfig::for_extensions(["py"])
        };
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 3);
        assert!(result.hit_file_cap);
    }

    #[test]
    fn exactly_max_files_does_not_flag_cap() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            touch(&dir.path().join(format!("f{i}.py")), 4);
        }
        let config = DiscoverConfig {
            max_files: 3,
            ..DiscoverConfig::for_extensions(["py"])
        };
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 3);
        assert!(!result.hit_file_cap);
    }

    #[test]
    fn oversized_files_are_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("big.c"), 100);
        touch(&dir.path().join("ok.c"), 10);
        let config = DiscoverConfig {
            max_file_bytes: 50,
            ..DiscoverConfig::for_extensions(["c"])
        };
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn aggregate_budget_stops_traversal() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            touch(&dir.path().join(format!("f{i}.c")), 30);
        }
        let config = DiscoverConfig {
            max_aggregate_bytes: 70,
            ..DiscoverConfig::for_extensions(["c"])
        };
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 2);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("MemoryCap")));
    }

    #[test]
    fn max_depth_bounds_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b/c");
        fs::create_dir_all(&deep).unwrap();
        touch(&dir.path().join("top.go"), 4);
        touch(&deep.join("deep.go"), 4);

        let config = DiscoverConfig {
            max_depth: 1,
            ..DiscoverConfig::for_extensions(["go"])
        };
        let result = discover(dir.path(), &config).unwrap();
        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("top.go"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let config = DiscoverConfig::for_extensions(["rs"]);
        assert!(discover(&missing, &config).is_err());
    }
}
