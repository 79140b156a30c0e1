//! Data readers: model output (single and multi-model) and observation
//! networks with an on-disk read-cache.

pub mod cache;
pub mod model;
pub mod multi;
pub mod obs;

pub use cache::{compute_fingerprint, read_cache, save_cache};
pub use model::{ReadGridded, VarReadOutcome};
pub use multi::{MultiReadResult, ReadGriddedMulti};
pub use obs::{import_data, read_daily, CacheStrategy, ObsNetwork};

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Find all immediate subdirectories of the given roots whose name exactly
/// equals or contains `id`.
///
/// Exact matches win over substring matches, so a model id that is a prefix
/// of another model's directory still resolves uniquely.
pub(crate) fn matching_data_dirs(roots: &[PathBuf], id: &str) -> Result<Vec<PathBuf>> {
    let mut exact = Vec::new();
    let mut partial = Vec::new();

    for root in roots {
        if !root.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == id {
                exact.push(entry.path());
            } else if name.contains(id) {
                partial.push(entry.path());
            }
        }
    }

    if !exact.is_empty() {
        return Ok(exact);
    }
    partial.sort();
    Ok(partial)
}

/// Directory name of a path, for error messages.
pub(crate) fn dir_names(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a path's final component is a dotfile.
pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_matching_data_dirs() {
        let root = tempdir().unwrap();
        std::fs::create_dir(root.path().join("TM5-met2010")).unwrap();
        std::fs::create_dir(root.path().join("TM5-met2012")).unwrap();
        std::fs::create_dir(root.path().join("ECHAM6")).unwrap();

        let roots = vec![root.path().to_path_buf()];

        // Exact match wins even though it is also a substring of nothing else
        let dirs = matching_data_dirs(&roots, "TM5-met2010").unwrap();
        assert_eq!(dirs.len(), 1);

        // Substring match is ambiguous across two directories
        let dirs = matching_data_dirs(&roots, "TM5").unwrap();
        assert_eq!(dirs.len(), 2);

        // No match
        let dirs = matching_data_dirs(&roots, "GEOS").unwrap();
        assert!(dirs.is_empty());
    }
}
