//! The normalized, framework-agnostic output record.

use crate::request::RequestShape;
use crate::resolver::Resolution;
use crate::response::ResponseShape;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP methods recognised in route declarations.
///
/// Serialized lower-cased, as it appears in Express route calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Parses a method name in any case (`get`, `GET`, `'Post'`).
    pub fn parse(method: &str) -> Option<Self> {
        match method.trim().trim_matches(|c| c == '\'' || c == '"').to_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything inferred about one route declaration.
///
/// `endpoint` and `method` are always set. The remaining fields fall back to
/// empty values when extraction fails; a handler that cannot be resolved leaves a
/// diagnostic string in `controller_code` (see [`Resolution`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationRecord {
    /// Path literal as written, template parameters included
    pub endpoint: String,
    pub method: HttpMethod,
    /// The handler reference or inline snippet exactly as written in the route call
    pub controller_signature: String,
    /// Resolved handler source, inline snippet, or diagnostic string
    pub controller_code: String,
    pub request_shape: RequestShape,
    /// Every matched response, in source order
    pub response_shapes: Vec<ResponseShape>,
    /// The primary response: first 2xx, else first non-2xx
    pub expected_response: Option<ResponseShape>,
    pub auth_required: bool,
    /// Raw middleware expressions guarding the route
    pub middleware: Vec<String>,
    /// Declaring file, relative to the repository root
    pub source_file: String,
}

impl SpecificationRecord {
    pub fn new(endpoint: String, method: HttpMethod, source_file: String) -> Self {
        Self {
            endpoint,
            method,
            controller_signature: String::new(),
            controller_code: String::new(),
            request_shape: RequestShape::default(),
            response_shapes: Vec::new(),
            expected_response: None,
            auth_required: false,
            middleware: Vec::new(),
            source_file,
        }
    }

    /// `true` unless `controller_code` carries one of the diagnostic strings.
    pub fn is_resolved(&self) -> bool {
        !Resolution::is_diagnostic_code(&self.controller_code)
    }
}
