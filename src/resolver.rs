//! Resolution of symbolic handler references to handler source text.
//!
//! A handler bound by an import is located in two steps: the module specifier is
//! mapped to a file under the repository root, then the named function is cut out
//! of that file with a bounded-depth brace matcher. Nothing is cached between
//! lookups; every resolution reads the target file afresh.

use crate::imports::ImportedSymbol;
use crate::lexer::{self, Delimited, Syntax};
use crate::source::{relative_display, SourceFile, SourceReader};
use log::{debug, warn};
use regex::Regex;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Brace levels a handler may span: the function body plus three nested blocks.
pub const MAX_HANDLER_DEPTH: usize = 4;

static FILE_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^Controller file '.*' not found\.$").expect("diagnostic pattern is valid")
});

static SYMBOL_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^Controller '.*' not found in '.*'\.$").expect("diagnostic pattern is valid")
});

/// Outcome of resolving a handler reference.
///
/// `Display` renders the resolved source, or one of the two fixed diagnostics:
///
/// - `Controller file '<path>' not found.`
/// - `Controller '<name>' not found in '<path>'.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Full source text of the handler, enclosing braces included
    Resolved(String),
    /// No file exists for the module; `attempted` is relative to the repository root
    FileNotFound { attempted: String },
    /// The file exists but does not define the name
    SymbolNotFound { name: String, file: String },
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// The text stored as a record's `controller_code`.
    pub fn into_code(self) -> String {
        match self {
            Resolution::Resolved(code) => code,
            diagnostic => diagnostic.to_string(),
        }
    }

    /// Recognises the diagnostic strings produced for unresolved handlers.
    pub fn is_diagnostic_code(code: &str) -> bool {
        FILE_NOT_FOUND.is_match(code) || SYMBOL_NOT_FOUND.is_match(code)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Resolved(code) => f.write_str(code),
            Resolution::FileNotFound { attempted } => {
                write!(f, "Controller file '{}' not found.", attempted)
            }
            Resolution::SymbolNotFound { name, file } => {
                write!(f, "Controller '{}' not found in '{}'.", name, file)
            }
        }
    }
}

/// Locates handler definitions referenced from route files.
pub struct ReferenceResolver<'a> {
    root: &'a Path,
    /// Source extensions of the dialect; the first is appended to bare specifiers
    extensions: &'a [&'a str],
    reader: &'a dyn SourceReader,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(root: &'a Path, extensions: &'a [&'a str], reader: &'a dyn SourceReader) -> Self {
        Self {
            root,
            extensions,
            reader,
        }
    }

    /// Resolves an imported symbol, `importer` being the file that imports it.
    pub fn resolve(&self, symbol: &ImportedSymbol, importer: &Path) -> Resolution {
        let candidates = self.module_candidates(&symbol.module_path, importer);
        debug!(
            "Resolving '{}' from '{}', candidates: {:?}",
            symbol.exported_name, symbol.module_path, candidates
        );

        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            let attempted = candidates
                .first()
                .map(|p| relative_display(self.root, p))
                .unwrap_or_else(|| symbol.module_path.clone());
            warn!("Controller file '{}' not found", attempted);
            return Resolution::FileNotFound { attempted };
        };

        let content = self.reader.read(path);
        match find_function(&content, &symbol.exported_name) {
            Some(code) => Resolution::Resolved(code),
            None => {
                let file = relative_display(self.root, path);
                warn!("Controller '{}' not found in '{}'", symbol.exported_name, file);
                Resolution::SymbolNotFound {
                    name: symbol.exported_name.clone(),
                    file,
                }
            }
        }
    }

    /// Resolves a name that is not imported by searching the route file itself.
    pub fn resolve_local(&self, name: &str, file: &SourceFile) -> Resolution {
        match find_function(&file.content, name) {
            Some(code) => Resolution::Resolved(code),
            None => {
                warn!("Controller '{}' not found in '{}'", name, file.relative_path);
                Resolution::SymbolNotFound {
                    name: name.to_string(),
                    file: file.relative_path.clone(),
                }
            }
        }
    }

    /// Files a module specifier may refer to, most preferred first.
    ///
    /// The first candidate anchors the specifier at the repository root with its
    /// `.`/`..` segments dropped; the others cover directory modules (`index.js`) and
    /// resolution relative to the importing file.
    pub fn module_candidates(&self, module_path: &str, importer: &Path) -> Vec<PathBuf> {
        let default_ext = self.extensions.first().copied().unwrap_or("js");
        let mut candidates = Vec::new();

        let anchored = anchor_module_path(self.root, module_path);
        let relative = importer
            .parent()
            .filter(|_| module_path.starts_with('.'))
            .map(|dir| lexical_join(dir, module_path));

        for base in std::iter::once(anchored).chain(relative) {
            candidates.push(self.with_source_extension(base.clone(), default_ext));
            if !self.has_source_extension(&base) {
                candidates.push(base.join(format!("index.{}", default_ext)));
            }
        }

        let mut unique = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        unique
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn with_source_extension(&self, path: PathBuf, default_ext: &str) -> PathBuf {
        if self.has_source_extension(&path) {
            return path;
        }
        let mut raw = path.into_os_string();
        raw.push(".");
        raw.push(default_ext);
        PathBuf::from(raw)
    }
}

/// Joins a module specifier onto the repository root, dropping traversal segments.
///
/// `../controllers/user` under `/repo` becomes `/repo/controllers/user`: everything
/// before the traversal is the base and the remainder is merged back onto it.
pub fn anchor_module_path(root: &Path, module_path: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in Path::new(module_path).components() {
        if let Component::Normal(segment) = component {
            path.push(segment);
        }
    }
    path
}

/// Joins `module_path` onto `dir`, applying `.` and `..` lexically.
fn lexical_join(dir: &Path, module_path: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    for component in Path::new(module_path).components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::ParentDir => {
                path.pop();
            }
            _ => {}
        }
    }
    path
}

/// Extracts the full definition of the function `name` from `content`.
///
/// Recognised forms:
///
/// ```text
/// const name = async (req, res) => { ... }
/// let name = req => { ... }
/// exports.name = async function (req, res) { ... }
/// async function name(req, res) { ... }
/// ```
///
/// Returns `None` when no definition is found or its body nests deeper than
/// [`MAX_HANDLER_DEPTH`].
pub fn find_function(content: &str, name: &str) -> Option<String> {
    let name = regex::escape(name);
    let binding = format!(r"(?:(?:const|let|var)\s+{name}|\b(?:module\.)?exports\.{name})\s*=\s*");
    let patterns = [
        format!(r"{binding}(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>\s*\{{"),
        format!(r"{binding}(?:async\s+)?function\b[^(]*\([^)]*\)\s*\{{"),
        format!(r"(?:async\s+)?function\s*\*?\s*{name}\s*\([^)]*\)\s*\{{"),
    ];

    let header = patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .filter_map(|re| re.find(content))
        .min_by_key(|m| m.start())?;

    match lexer::match_braces(content, header.end() - 1, MAX_HANDLER_DEPTH, Syntax::JavaScript) {
        Delimited::Closed(end) => Some(content[header.start()..end].to_string()),
        Delimited::TooDeep => {
            debug!("Handler body nests deeper than {} levels", MAX_HANDLER_DEPTH);
            None
        }
        Delimited::Unterminated => None,
    }
}
