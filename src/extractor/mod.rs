//! Framework adapters.
//!
//! Each supported framework family implements [`FrameworkAdapter`]: it declares
//! which files it reads and turns the loaded files into specification records.
//! Route discovery is per framework; the request, response and auth analysis
//! downstream of it is shared.
//!
//! # Supported Frameworks
//!
//! - **Express** (`NODE`): See [`node::NodeAdapter`]
//! - **Django** (`DJANGO`): See [`django::DjangoAdapter`]
//!
//! # Example
//!
//! ```no_run
//! use apispec_from_source::extractor::{ExtractionContext, FrameworkAdapter, node::NodeAdapter};
//! use apispec_from_source::scanner::FileScanner;
//! use apispec_from_source::source::{FsSourceReader, SourceFile};
//! use std::path::Path;
//!
//! let root = Path::new("my-service");
//! let adapter = NodeAdapter::default();
//! let scan = FileScanner::new(root.to_path_buf())
//!     .with_extensions(adapter.extensions())
//!     .with_skip_dirs(adapter.skip_dirs())
//!     .scan();
//! let files: Vec<SourceFile> = scan
//!     .source_files
//!     .iter()
//!     .map(|p| SourceFile::load(&FsSourceReader, root, p))
//!     .collect();
//! let records = adapter.extract_routes(&files, &ExtractionContext::new(root, &FsSourceReader));
//! println!("Found {} routes", records.len());
//! ```

pub mod django;
pub mod node;

use crate::detector::Framework;
use crate::record::SpecificationRecord;
use crate::source::{SourceFile, SourceReader};
use std::path::Path;

/// Shared state handed to an adapter for one run.
pub struct ExtractionContext<'a> {
    /// Repository root; record paths are relative to it
    pub root: &'a Path,
    /// Reader used for any file the adapter loads beyond the walked ones
    pub reader: &'a dyn SourceReader,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(root: &'a Path, reader: &'a dyn SourceReader) -> Self {
        Self { root, reader }
    }
}

/// One framework family's extraction dialect.
pub trait FrameworkAdapter {
    fn framework(&self) -> Framework;

    /// Source file extensions without the dot; the first is the default module extension.
    fn extensions(&self) -> &'static [&'static str];

    /// Directory names never descended into, on top of hidden ones.
    fn skip_dirs(&self) -> &'static [&'static str];

    /// Extracts route records from every walked file.
    ///
    /// `files` are in traversal order, already de-duplicated, and exclude empty files.
    /// Records come back in the order their route declarations were found.
    fn extract_routes(
        &self,
        files: &[SourceFile],
        ctx: &ExtractionContext,
    ) -> Vec<SpecificationRecord>;
}
