//! Discovery Module for Rain Compiler
//!
//! Recursively scans a directory for component files.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All files under `dir` with the given extension, sorted by path.
pub fn discover_components(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("[Rain] skipping unreadable entry during discovery: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files
}
