use crate::error::{Error, Result};
use crate::extractor::django::DjangoAdapter;
use crate::extractor::node::NodeAdapter;
use crate::extractor::FrameworkAdapter;
use crate::scanner::FileScanner;
use crate::source::{FsSourceReader, SourceReader};
use clap::ValueEnum;
use log::debug;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

static EXPRESS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\s*\(\s*['"]express['"]\s*\)|from\s+['"]express['"]"#)
        .expect("express import pattern is valid")
});

static EXPRESS_DEPENDENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""express"\s*:"#).expect("dependency pattern is valid"));

/// Supported framework families.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Framework {
    /// Express on Node.js
    #[value(alias = "nodejs", alias = "express")]
    Node,
    /// Django and Django REST framework
    Django,
}

impl Framework {
    /// The adapter implementing this family's dialect.
    pub fn adapter(&self) -> Box<dyn FrameworkAdapter> {
        match self {
            Framework::Node => Box::new(NodeAdapter),
            Framework::Django => Box::new(DjangoAdapter),
        }
    }
}

impl FromStr for Framework {
    type Err = Error;

    /// Parses a framework tag, ignoring case: `node`, `nodejs` or `express`, and `django`.
    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_lowercase().as_str() {
            "node" | "nodejs" | "express" => Ok(Framework::Node),
            "django" => Ok(Framework::Django),
            _ => Err(Error::UnsupportedFramework(tag.to_string())),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Node => write!(f, "NODE"),
            Framework::Django => write!(f, "DJANGO"),
        }
    }
}

/// Framework detector for identifying which supported families a repository uses.
///
/// Detection looks at project markers, not routes:
/// - Express: a `package.json` depending on `express`, or a script requiring or
///   importing it
/// - Django: a `manage.py`, or a `urls.py` declaring `urlpatterns`
pub struct FrameworkDetector;

/// Result of framework detection.
pub struct DetectionResult {
    /// Detected frameworks, in declaration order of [`Framework`]
    pub frameworks: Vec<Framework>,
}

impl FrameworkDetector {
    /// Detects the frameworks used under `root`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use apispec_from_source::detector::FrameworkDetector;
    /// use std::path::Path;
    ///
    /// let result = FrameworkDetector::detect(Path::new("./my-service"));
    /// println!("Detected {} framework(s)", result.frameworks.len());
    /// ```
    pub fn detect(root: &Path) -> DetectionResult {
        let reader = FsSourceReader;
        let mut frameworks = Vec::new();

        if Self::uses_express(root, &reader) {
            frameworks.push(Framework::Node);
        }
        if Self::uses_django(root, &reader) {
            frameworks.push(Framework::Django);
        }

        debug!("Detected frameworks: {:?}", frameworks);
        DetectionResult { frameworks }
    }

    fn uses_express(root: &Path, reader: &dyn SourceReader) -> bool {
        let adapter = NodeAdapter;
        let mut extensions = adapter.extensions().to_vec();
        extensions.push("json");

        Self::files(root, &extensions, adapter.skip_dirs()).into_iter().any(|path| {
            let content = reader.read(&path);
            if path.file_name().is_some_and(|n| n == "package.json") {
                EXPRESS_DEPENDENCY.is_match(&content)
            } else {
                EXPRESS_IMPORT.is_match(&content)
            }
        })
    }

    fn uses_django(root: &Path, reader: &dyn SourceReader) -> bool {
        let adapter = DjangoAdapter;

        Self::files(root, adapter.extensions(), adapter.skip_dirs()).into_iter().any(|path| {
            match path.file_name().and_then(|n| n.to_str()) {
                Some("manage.py") => true,
                Some("urls.py") => reader.read(&path).contains("urlpatterns"),
                _ => false,
            }
        })
    }

    fn files(root: &Path, extensions: &[&str], skip_dirs: &[&str]) -> Vec<PathBuf> {
        FileScanner::new(root.to_path_buf())
            .with_extensions(extensions)
            .with_skip_dirs(skip_dirs)
            .scan()
            .source_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_framework_tags() {
        assert_eq!("node".parse::<Framework>().unwrap(), Framework::Node);
        assert_eq!("NodeJS".parse::<Framework>().unwrap(), Framework::Node);
        assert_eq!("express".parse::<Framework>().unwrap(), Framework::Node);
        assert_eq!("Django".parse::<Framework>().unwrap(), Framework::Django);
    }

    #[test]
    fn test_unsupported_tag() {
        let err = "flask".parse::<Framework>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFramework(ref tag) if tag == "flask"));
    }

    #[test]
    fn test_adapter_matches_framework() {
        assert_eq!(Framework::Node.adapter().framework(), Framework::Node);
        assert_eq!(Framework::Django.adapter().framework(), Framework::Django);
    }

    #[test]
    fn test_detect_express_from_package_json() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(
            &temp_dir,
            "package.json",
            r#"{ "dependencies": { "express": "^4.18.2" } }"#,
        );

        let result = FrameworkDetector::detect(temp_dir.path());
        assert_eq!(result.frameworks, vec![Framework::Node]);
    }

    #[test]
    fn test_detect_express_from_import() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "src/server.js", "const express = require('express');\n");

        let result = FrameworkDetector::detect(temp_dir.path());
        assert_eq!(result.frameworks, vec![Framework::Node]);
    }

    #[test]
    fn test_express_in_node_modules_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(
            &temp_dir,
            "node_modules/express/index.js",
            "module.exports = require('express');\n",
        );

        let result = FrameworkDetector::detect(temp_dir.path());
        assert!(result.frameworks.is_empty());
    }

    #[test]
    fn test_detect_django() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "blog/urls.py", "urlpatterns = []\n");

        let result = FrameworkDetector::detect(temp_dir.path());
        assert_eq!(result.frameworks, vec![Framework::Django]);
    }

    #[test]
    fn test_detect_mixed_frameworks() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "manage.py", "import django\n");
        create_temp_file(&temp_dir, "frontend/server.js", "import express from 'express';\n");

        let result = FrameworkDetector::detect(temp_dir.path());
        assert_eq!(result.frameworks, vec![Framework::Node, Framework::Django]);
    }

    #[test]
    fn test_detect_no_framework() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "README.md", "# nothing here\n");

        let result = FrameworkDetector::detect(temp_dir.path());
        assert!(result.frameworks.is_empty());
    }
}
