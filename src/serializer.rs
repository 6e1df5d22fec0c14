//! Serialization of specification documents to JSON or YAML.
//!
//! This module renders an [`ApiSpecDocument`] in a standard format and writes it
//! to files or returns it as a string.

use crate::aggregator::ApiSpecDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a specification document to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
///
/// # Example
///
/// ```no_run
/// use apispec_from_source::detector::Framework;
/// use apispec_from_source::serializer::serialize_yaml;
/// use std::path::Path;
///
/// let doc = apispec_from_source::extract(Path::new("./my-service"), Framework::Node).unwrap();
/// println!("{}", serialize_yaml(&doc).unwrap());
/// ```
pub fn serialize_yaml(doc: &ApiSpecDocument) -> Result<String> {
    debug!("Serializing {} records to YAML", doc.len());
    serde_yaml::to_string(doc).context("Failed to serialize API specification to YAML")
}

/// Serializes a specification document to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &ApiSpecDocument) -> Result<String> {
    debug!("Serializing {} records to JSON", doc.len());
    serde_json::to_string_pretty(doc).context("Failed to serialize API specification to JSON")
}

/// Writes string content to a file.
///
/// Creates the file and any missing parent directories, or overwrites the file if
/// it exists.
///
/// # Errors
///
/// Returns an error if a directory or the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
