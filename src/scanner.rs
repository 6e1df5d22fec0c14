use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File scanner for traversing repository directories.
///
/// The `FileScanner` recursively walks a repository and yields every source file whose
/// extension belongs to the active framework adapter. Entries whose name starts with `.`
/// are skipped, as are directories named in the skip list (e.g. `node_modules`).
///
/// Traversal is depth-first and sorted by file name so repeated runs over an unchanged
/// tree visit files in the same order. Symbolic links are followed; a file reachable
/// through several paths is yielded once, keyed by its canonical path.
///
/// # Example
///
/// ```no_run
/// use apispec_from_source::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-service")).with_extensions(&["js"]);
/// let result = scanner.scan();
/// println!("Found {} source files", result.source_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    extensions: Vec<String>,
    skip_dirs: Vec<String>,
}

/// Result of a directory scan.
///
/// Contains the discovered files and any warnings encountered during scanning.
pub struct ScanResult {
    /// Paths of all matching files, in traversal order
    pub source_files: Vec<PathBuf>,
    /// Warning messages for entries that could not be accessed
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    ///
    /// Without an extension filter every regular file matches.
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            extensions: Vec::new(),
            skip_dirs: Vec::new(),
        }
    }

    /// Restricts the scan to files with one of the given extensions (without the dot).
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Directory names that are never descended into.
    pub fn with_skip_dirs(mut self, dirs: &[&str]) -> Self {
        self.skip_dirs = dirs.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Lazily walks the tree.
    ///
    /// Yields `Ok(path)` for each matching file and `Err(warning)` for each entry that
    /// could not be accessed. An unreadable directory never stops the walk; its siblings
    /// are still visited.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, String>> + '_ {
        let mut seen: HashSet<PathBuf> = HashSet::new();

        WalkDir::new(&self.root_path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| self.keep_entry(e))
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() || !self.matches_extension(entry.path()) {
                        return None;
                    }

                    let canonical = fs::canonicalize(entry.path())
                        .unwrap_or_else(|_| entry.path().to_path_buf());
                    if !seen.insert(canonical) {
                        debug!("Skipping already visited file: {}", entry.path().display());
                        return None;
                    }

                    Some(Ok(entry.into_path()))
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    Some(Err(warning))
                }
            })
    }

    /// Scans the whole tree and collects the matching files.
    pub fn scan(&self) -> ScanResult {
        let mut source_files = Vec::new();
        let mut warnings = Vec::new();

        for item in self.walk() {
            match item {
                Ok(path) => source_files.push(path),
                Err(warning) => warnings.push(warning),
            }
        }

        ScanResult {
            source_files,
            warnings,
        }
    }

    fn keep_entry(&self, entry: &DirEntry) -> bool {
        // Don't filter the root directory itself
        if entry.depth() == 0 {
            return true;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with('.') {
            return false;
        }

        !(entry.file_type().is_dir() && self.skip_dirs.iter().any(|d| d == file_name.as_ref()))
    }

    fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}
