//! API specification inference from web-service source trees.
//!
//! This library recovers, without executing anything, the routes a web service
//! declares: each route's method and path, the handler bound to it, the middleware
//! guarding it, the request fields the handler reads, the responses it produces and
//! whether authentication is required. Everything is recovered from lexical
//! patterns; a handler that cannot be located degrades into a diagnostic string on
//! its record instead of failing the run.
//!
//! # Supported Frameworks
//!
//! - **Express** (`NODE`): routes on `app`/`router` objects, handlers resolved
//!   through destructured `require`/`import` bindings
//! - **Django** (`DJANGO`): `urlpatterns` entries paired with function or
//!   class-based views and their serializers
//!
//! # Architecture
//!
//! 1. [`scanner`] - Walks the repository for the adapter's source files
//! 2. [`source`] - Loads file content through a replaceable [`source::SourceReader`]
//! 3. [`extractor`] - Framework adapters discovering route declarations
//! 4. [`imports`] and [`resolver`] - Turn handler names into handler source
//! 5. [`request`], [`response`] and [`auth`] - Analyse the handler source
//! 6. [`aggregator`] - Collects records into an [`aggregator::ApiSpecDocument`]
//! 7. [`serializer`] - Renders the document as JSON or YAML
//!
//! # Example Usage
//!
//! ```no_run
//! use apispec_from_source::serializer::serialize_json;
//! use std::path::Path;
//!
//! let document = apispec_from_source::extract_tagged(Path::new("./my-service"), "nodejs").unwrap();
//! for record in &document.api_specs {
//!     println!("{} {} -> {}", record.method, record.endpoint, record.controller_signature);
//! }
//! println!("{}", serialize_json(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod aggregator;
pub mod auth;
pub mod cli;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod imports;
pub mod lexer;
pub mod record;
pub mod request;
pub mod resolver;
pub mod response;
pub mod scanner;
pub mod serializer;
pub mod source;

use aggregator::{ApiSpecDocument, SpecificationAggregator};
use detector::Framework;
use error::{Error, Result};
use extractor::ExtractionContext;
use log::{debug, info};
use scanner::FileScanner;
use source::{FsSourceReader, SourceFile, SourceReader};
use std::path::Path;

/// Outcome of a run over one repository.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub document: ApiSpecDocument,
    /// Non-empty source files handed to the adapters
    pub files_processed: usize,
    /// Entries the walk could not access
    pub warnings: Vec<String>,
}

/// Extracts the specification records of `root` for one framework family.
///
/// # Errors
///
/// Fails only when `root` is not a directory. Unreadable files, missing controller
/// files and missing symbols are reported through logging and diagnostic strings
/// on the affected records.
pub fn extract(root: &Path, framework: Framework) -> Result<ApiSpecDocument> {
    extract_with_reader(root, framework, &FsSourceReader)
}

/// Like [`extract`], reading every file through `reader`.
pub fn extract_with_reader(
    root: &Path,
    framework: Framework,
    reader: &dyn SourceReader,
) -> Result<ApiSpecDocument> {
    Ok(extract_all(root, &[framework], reader)?.document)
}

/// Like [`extract`], with the framework given as a tag such as `"nodejs"` or `"django"`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFramework`] for an unknown tag, before anything is read.
pub fn extract_tagged(root: &Path, tag: &str) -> Result<ApiSpecDocument> {
    let framework: Framework = tag.parse()?;
    extract(root, framework)
}

/// Runs each framework's adapter over `root` in turn and aggregates their records.
pub fn extract_all(
    root: &Path,
    frameworks: &[Framework],
    reader: &dyn SourceReader,
) -> Result<Extraction> {
    if !root.is_dir() {
        return Err(Error::InvalidRoot(root.to_path_buf()));
    }

    let ctx = ExtractionContext::new(root, reader);
    let mut aggregator = SpecificationAggregator::new();
    let mut files_processed = 0;
    let mut warnings = Vec::new();

    for framework in frameworks {
        let adapter = framework.adapter();
        info!("Scanning {} source files...", framework);

        let scan = FileScanner::new(root.to_path_buf())
            .with_extensions(adapter.extensions())
            .with_skip_dirs(adapter.skip_dirs())
            .scan();
        warnings.extend(scan.warnings);

        let files: Vec<SourceFile> = scan
            .source_files
            .iter()
            .map(|path| SourceFile::load(reader, root, path))
            .filter(|file| {
                if file.is_empty() {
                    debug!("Skipping empty file: {}", file.relative_path);
                }
                !file.is_empty()
            })
            .collect();
        info!("Found {} {} source files", files.len(), framework);
        files_processed += files.len();

        let records = adapter.extract_routes(&files, &ctx);
        info!("Extracted {} routes for {}", records.len(), framework);
        aggregator.extend(records);
    }

    Ok(Extraction {
        document: aggregator.build(),
        files_processed,
        warnings,
    })
}
