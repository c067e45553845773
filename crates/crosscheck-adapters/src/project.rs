//! Language-specific project root location.

use std::path::{Path, PathBuf};

use crosscheck_core::{discover, AdapterError, DiscoverConfig};

/// Walk up from `start` looking for a marker file; the directory holding
/// the first match is the project root.
pub fn locate_root(start: &Path, markers: &[&'static str]) -> Result<PathBuf, AdapterError> {
    let mut current = Some(start);
    while let Some(dir) = current {
        for marker in markers {
            if dir.join(marker).is_file() {
                return Ok(dir.to_path_buf());
            }
        }
        current = dir.parent();
    }
    Err(AdapterError::ProjectNotFound {
        marker: markers.first().copied().unwrap_or("marker"),
        root: start.display().to_string(),
    })
}

/// Root location for marker-less languages: `start` qualifies when the
/// bounded walk finds at least one file with a matching extension.
pub fn locate_root_by_extensions(
    start: &Path,
    extensions: &[&'static str],
    marker_name: &'static str,
) -> Result<PathBuf, AdapterError> {
    let config = DiscoverConfig {
        max_files: 1,
        ..DiscoverConfig::for_extensions(extensions.iter().copied())
    };
    let found = discover(start, &config)?;
    if found.files.is_empty() {
        return Err(AdapterError::ProjectNotFound {
            marker: marker_name,
            root: start.display().to_string(),
        });
    }
    Ok(start.to_path_buf())
}
