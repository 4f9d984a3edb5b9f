use anyhow::{bail, Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// AST parser for Rust source files.
///
/// Uses the `syn` crate to parse source code into syntax trees, which the
/// rest of the crate analyzes to extract handler metadata and type
/// information.
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid
    /// Rust syntax.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let syntax_tree = syn::parse_file(&content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }

    /// Parses multiple Rust source files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings but do not stop the
    /// remaining files from being parsed. Used by the CLI scan, where a
    /// partially parseable project is still worth reporting on.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| match Self::parse_file(path) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }

    /// Parses every non-test Rust file directly inside `dir`.
    ///
    /// One directory is one analysis unit: the result is all-or-nothing.
    /// Any unreadable or syntactically invalid file fails the whole
    /// directory, so callers never observe partial type catalogs.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or any contained
    /// file fails to parse.
    pub fn parse_dir(dir: &Path) -> Result<Vec<ParsedFile>> {
        debug!("Parsing directory: {}", dir.display());

        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("Failed to list directory: {}", dir.display()))?;
            let path = entry.path();
            if path.is_file() && is_source_file(&path) {
                paths.push(path);
            }
        }
        // Stable ordering keeps "first discovered" lookups deterministic.
        paths.sort();

        if paths.is_empty() {
            bail!("No Rust source files in directory: {}", dir.display());
        }

        let mut parsed = Vec::with_capacity(paths.len());
        for path in &paths {
            parsed.push(Self::parse_file(path)?);
        }

        debug!("Parsed {} files in {}", parsed.len(), dir.display());
        Ok(parsed)
    }
}

/// Whether a path names a Rust source file that takes part in analysis.
/// Test files and hidden files are excluded.
pub fn is_source_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if name.starts_with('.') {
        return false;
    }
    if !name.ends_with(".rs") {
        return false;
    }
    !(name.ends_with("_test.rs") || name == "tests.rs")
}
