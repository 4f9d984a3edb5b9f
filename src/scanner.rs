use anyhow::Result;
use log::warn;
use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::parser::is_source_file;

/// File scanner for traversing project directories.
///
/// Recursively walks a project tree to find Rust source files, skipping
/// `target`, `tests`, and hidden directories. The analysis engine itself
/// works one directory at a time; the scanner exists so the CLI can
/// discover which directories are worth analyzing.
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of a directory scan.
pub struct ScanResult {
    /// All discovered non-test `.rs` files
    pub rust_files: Vec<PathBuf>,
    /// Warning messages for inaccessible paths
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` rooted at `root_path`.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all analyzable `.rs` files.
    ///
    /// Skips the `target` directory, `tests` directories, and hidden
    /// directories. Inaccessible paths are recorded as warnings and do not
    /// abort the scan.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path).into_iter().filter_entry(|e| {
            if e.path() == self.root_path {
                return true;
            }

            let file_name = e.file_name().to_string_lossy();
            let is_hidden = file_name.starts_with('.');
            let is_target = file_name == "target";
            let is_tests = e.file_type().is_dir() && file_name == "tests";

            !is_hidden && !is_target && !is_tests
        }) {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_source_file(path) {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }

    /// Scans the tree and returns the set of directories that directly
    /// contain analyzable Rust files, each being one analysis unit.
    pub fn scan_directories(&self) -> Result<Vec<PathBuf>> {
        let result = self.scan()?;
        let dirs: BTreeSet<PathBuf> = result
            .rust_files
            .iter()
            .filter_map(|file| file.parent().map(|p| p.to_path_buf()))
            .collect();
        Ok(dirs.into_iter().collect())
    }
}
