//! Source file loading.
//!
//! Reading never aborts a run: a file that cannot be read is logged and treated
//! as empty, and empty files contribute no routes.

use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Loads the text content of a single file.
///
/// The engine reads every file through this trait, so callers can substitute an
/// instrumented or in-memory implementation.
pub trait SourceReader {
    /// Returns the file content, or an empty string when it cannot be read.
    fn read(&self, path: &Path) -> String;
}

/// [`SourceReader`] backed by the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceReader;

impl SourceReader for FsSourceReader {
    fn read(&self, path: &Path) -> String {
        match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Error reading file {}: {}", path.display(), e);
                String::new()
            }
        }
    }
}

/// A loaded source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path of the file as discovered on disk
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,
    /// Full text content
    pub content: String,
}

impl SourceFile {
    /// Reads `path` through `reader` and records its location relative to `root`.
    pub fn load(reader: &dyn SourceReader, root: &Path, path: &Path) -> Self {
        debug!("Reading file: {}", path.display());
        Self {
            path: path.to_path_buf(),
            relative_path: relative_display(root, path),
            content: reader.read(path),
        }
    }

    /// File name component, e.g. `urls.py`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Renders `path` relative to `root` with `/` separators.
///
/// Paths outside `root` are rendered as given.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.js");
        fs::write(&path, "const x = 1;").unwrap();

        assert_eq!(FsSourceReader.read(&path), "const x = 1;");
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let content = FsSourceReader.read(&temp_dir.path().join("missing.js"));
        assert!(content.is_empty());
    }

    #[test]
    fn test_load_records_relative_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/routes")).unwrap();
        let path = root.join("src/routes/users.js");
        fs::write(&path, "router.get('/', list);").unwrap();

        let file = SourceFile::load(&FsSourceReader, root, &path);
        assert_eq!(file.relative_path, "src/routes/users.js");
        assert_eq!(file.file_name(), "users.js");
        assert!(!file.is_empty());
    }

    #[test]
    fn test_relative_display_outside_root() {
        let rendered = relative_display(Path::new("/repo"), Path::new("/other/file.js"));
        assert_eq!(rendered, "other/file.js");
    }
}
