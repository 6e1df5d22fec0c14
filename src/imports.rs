//! Per-file import bindings.
//!
//! Only destructured bindings are recognised:
//!
//! ```text
//! const { getUser, createUser } = require('../controllers/user');
//! const { remove: deleteUser } = require('../controllers/user');
//! import { listPosts, getPost as showPost } from './posts';
//! ```
//!
//! Plain `const ctrl = require('...')` and dynamic imports are not matched.

use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static REQUIRE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:const|let|var)\s*\{([^}]*)\}\s*=\s*require\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("require pattern is valid")
});

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s+(?:[\w$]+\s*,\s*)?\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#)
        .expect("import pattern is valid")
});

/// A name made available in a file by an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSymbol {
    /// Module specifier exactly as written, e.g. `../controllers/user`
    pub module_path: String,
    /// Name exported by the module; differs from the local name when renamed
    pub exported_name: String,
}

/// Mapping from locally bound name to the module it was imported from.
///
/// Built for one file and dropped once that file's routes are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBinding {
    symbols: BTreeMap<String, ImportedSymbol>,
}

impl ImportBinding {
    /// Scans `content` for destructured `require`/`import` statements.
    ///
    /// When a name is bound twice the later statement wins, as it would at runtime.
    pub fn parse(content: &str) -> Self {
        let mut binding = Self::default();

        for caps in REQUIRE_PATTERN.captures_iter(content) {
            binding.add_names(&caps[1], &caps[2], ':');
        }
        for caps in IMPORT_PATTERN.captures_iter(content) {
            binding.add_names(&caps[1], &caps[2], ' ');
        }

        debug!("Import bindings: {:?}", binding.symbols.keys().collect::<Vec<_>>());
        binding
    }

    fn add_names(&mut self, names: &str, module_path: &str, rename: char) {
        for entry in names.split(',') {
            let entry = entry.trim();
            if entry.is_empty() || entry.starts_with("...") {
                continue;
            }

            let (exported, local) = match rename {
                ':' => match entry.split_once(':') {
                    Some((exported, local)) => (exported.trim(), local.trim()),
                    None => (entry, entry),
                },
                _ => match entry.split_once(" as ") {
                    Some((exported, local)) => (exported.trim(), local.trim()),
                    None => (entry, entry),
                },
            };
            // `{ a = 1 }` defaults in require destructuring
            let local = local.split('=').next().unwrap_or(local).trim();

            if local.is_empty() {
                continue;
            }
            self.symbols.insert(
                local.to_string(),
                ImportedSymbol {
                    module_path: module_path.to_string(),
                    exported_name: exported.to_string(),
                },
            );
        }
    }

    /// Looks up a locally bound name.
    pub fn get(&self, name: &str) -> Option<&ImportedSymbol> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_destructured_require() {
        let content = r#"
            const express = require('express');
            const { getUser, createUser } = require('../controllers/userController');
        "#;

        let binding = ImportBinding::parse(content);

        assert_eq!(binding.len(), 2);
        let symbol = binding.get("getUser").unwrap();
        assert_eq!(symbol.module_path, "../controllers/userController");
        assert_eq!(symbol.exported_name, "getUser");
        assert!(binding.get("createUser").is_some());
        // Non-destructured requires are not bindings
        assert!(binding.get("express").is_none());
    }

    #[test]
    fn test_parse_multiline_require() {
        let content = "const {\n  listPosts,\n  deletePost,\n} = require(\"./posts\");";

        let binding = ImportBinding::parse(content);

        assert_eq!(binding.len(), 2);
        assert_eq!(binding.get("deletePost").unwrap().module_path, "./posts");
    }

    #[test]
    fn test_parse_renamed_require() {
        let binding = ImportBinding::parse("let { remove: deleteUser } = require('./users');");

        let symbol = binding.get("deleteUser").unwrap();
        assert_eq!(symbol.exported_name, "remove");
        assert!(binding.get("remove").is_none());
    }

    #[test]
    fn test_parse_es_module_imports() {
        let content = r#"
            import express, { Router } from 'express';
            import { listPosts, getPost as showPost } from '../controllers/posts.js';
        "#;

        let binding = ImportBinding::parse(content);

        assert_eq!(binding.get("Router").unwrap().module_path, "express");
        assert_eq!(
            binding.get("listPosts").unwrap().module_path,
            "../controllers/posts.js"
        );
        let renamed = binding.get("showPost").unwrap();
        assert_eq!(renamed.exported_name, "getPost");
    }

    #[test]
    fn test_parse_no_imports() {
        let binding = ImportBinding::parse("module.exports = router;");
        assert!(binding.is_empty());
    }
}
